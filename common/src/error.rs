use std::io;

pub type ProxyResult<T> = Result<T, ProxyError>;

/// Top level error type for the proxy. `Wait` is the one variant that is
/// recovered from locally (no data available this tick) ; everything else
/// is meant to propagate with `?` up to the Program tick or to `main`.
#[derive(Debug)]
pub enum ProxyError {
    /// Nothing was available this tick (would-block / timeout / EAGAIN).
    Wait,
    Fatal(ErrorKind),
}

#[derive(Debug)]
pub enum ErrorKind {
    Io(io::ErrorKind),
    Zmq(String),
    AddrParse,
    Malformed(String),
    UnknownMessageType(String),
    FilterMismatch(String),
}

impl ProxyError {
    #[inline]
    pub fn has_failed(&self) -> bool {
        !matches!(self, ProxyError::Wait)
    }
}

impl From<io::Error> for ProxyError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::WouldBlock => ProxyError::Wait,
            kind => ProxyError::Fatal(ErrorKind::Io(kind)),
        }
    }
}

impl From<std::net::AddrParseError> for ProxyError {
    #[inline]
    fn from(_: std::net::AddrParseError) -> Self {
        ProxyError::Fatal(ErrorKind::AddrParse)
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::Wait => write!(f, "no data available"),
            ProxyError::Fatal(kind) => write!(f, "fatal proxy error: {:?}", kind),
        }
    }
}

impl std::error::Error for ProxyError {}
