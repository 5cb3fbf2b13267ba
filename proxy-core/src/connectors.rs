//! Thin transport handles, each wrapping exactly one ZeroMQ socket
//! configured with `LINGER` disabled so that shutdown is prompt even when
//! peers are gone (spec §4.2). This is the one module in the crate that
//! knows the transport is ZeroMQ; everything above it only sees `read`,
//! `write` and `exchange`.
use common::error::{ErrorKind, ProxyError, ProxyResult};
use common::logging::{self, Logger};
use std::sync::Arc;

fn connect(
    context: &zmq::Context,
    kind: zmq::SocketType,
    address: &str,
) -> ProxyResult<zmq::Socket> {
    let socket = context
        .socket(kind)
        .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))?;
    socket
        .set_linger(0)
        .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))?;
    socket
        .connect(address)
        .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))?;
    Ok(socket)
}

fn bind(context: &zmq::Context, kind: zmq::SocketType, address: &str) -> ProxyResult<zmq::Socket> {
    let socket = context
        .socket(kind)
        .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))?;
    socket
        .bind(address)
        .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))?;
    Ok(socket)
}

/// `EAGAIN` is "nothing available this tick" ; every other ZMQ error is fatal.
fn classify_recv(err: zmq::Error) -> ProxyError {
    if err == zmq::Error::EAGAIN {
        ProxyError::Wait
    } else {
        ProxyError::Fatal(ErrorKind::Zmq(err.to_string()))
    }
}

/// Non-blocking reader of the server's publish channel. Subscribes to all
/// topics ; the envelope's `message_type`/`routing_id` fields do the
/// filtering, not the ZMQ subscription itself.
pub struct Subscriber {
    socket: zmq::Socket,
}

impl Subscriber {
    pub fn new(address: &str, context: &zmq::Context) -> ProxyResult<Subscriber> {
        let socket = connect(context, zmq::SUB, address)?;
        socket
            .set_subscribe(b"")
            .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))?;
        Ok(Subscriber { socket })
    }

    /// Returns `Ok(bytes)` if a message arrived, `Err(ProxyError::Wait)` if
    /// there was nothing to read this tick.
    pub fn read(&self) -> ProxyResult<Vec<u8>> {
        self.socket
            .recv_bytes(zmq::DONTWAIT)
            .map_err(classify_recv)
    }
}

/// Write-only handle to the server's pull channel.
pub struct Pusher {
    socket: zmq::Socket,
}

impl Pusher {
    pub fn new(address: &str, context: &zmq::Context) -> ProxyResult<Pusher> {
        Ok(Pusher {
            socket: connect(context, zmq::PUSH, address)?,
        })
    }

    pub fn write(&self, message: &[u8]) -> ProxyResult<()> {
        self.socket
            .send(message, 0)
            .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))
    }
}

/// Request/reply pair used for the few synchronous exchanges the core
/// needs ; reads are non-blocking like every other connector.
pub struct Replier {
    socket: zmq::Socket,
}

impl Replier {
    pub fn new(address: &str, context: &zmq::Context) -> ProxyResult<Replier> {
        Ok(Replier {
            socket: connect(context, zmq::REQ, address)?,
        })
    }

    pub fn write(&self, message: &[u8]) -> ProxyResult<()> {
        self.socket
            .send(message, 0)
            .map_err(|e| ProxyError::Fatal(ErrorKind::Zmq(e.to_string())))
    }

    pub fn read(&self) -> ProxyResult<Vec<u8>> {
        self.socket
            .recv_bytes(zmq::DONTWAIT)
            .map_err(classify_recv)
    }

    pub fn exchange(&self, query: &[u8]) -> ProxyResult<Vec<u8>> {
        self.write(query)?;
        self.read()
    }
}

/// Reply-socket endpoint bound on a local admin port. Reads are
/// non-blocking ; writes are best-effort (logged on failure, never fatal —
/// spec §4.2).
pub struct AdminEndpoint {
    socket: zmq::Socket,
    log: Logger,
}

impl AdminEndpoint {
    pub fn new(admin_port: u16, context: &zmq::Context, log: &Logger) -> ProxyResult<AdminEndpoint> {
        let address = format!("tcp://*:{}", admin_port);
        Ok(AdminEndpoint {
            socket: bind(context, zmq::REP, &address)?,
            log: log.new(logging::o!()),
        })
    }

    pub fn read(&self) -> ProxyResult<String> {
        self.socket
            .recv_string(zmq::DONTWAIT)
            .map_err(classify_recv)?
            .map_err(|_| ProxyError::Fatal(ErrorKind::Malformed("non-utf8 admin command".into())))
    }

    pub fn write(&self, message: &str) {
        if let Err(e) = self.socket.send(message, 0) {
            logging::warn!(self.log, "could not send admin reply"; "error" => e.to_string());
        }
    }
}

/// Lazily shared ZMQ context ; the library never needs more than one.
pub fn new_context() -> Arc<zmq::Context> {
    Arc::new(zmq::Context::new())
}
