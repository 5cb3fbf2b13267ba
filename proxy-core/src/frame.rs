use common::error::{ErrorKind, ProxyError, ProxyResult};

/// The three-field envelope carried on the subscribe/push channels:
/// `routing_id SP message_type SP raw_bytes`, split on the first two space
/// bytes only. `raw_bytes` is returned verbatim and must not be interpreted
/// any further by this layer.
pub struct Frame {
    pub routing_id: String,
    pub message_type: String,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Parses a raw subscribe-channel message into its three fields. A
    /// malformed frame (fewer than three space-separated parts) is a fatal
    /// programmer error in the envelope producer.
    pub fn parse(raw: &[u8]) -> ProxyResult<Frame> {
        let first = find(raw, 0)
            .ok_or_else(|| malformed(raw))?;
        let second = find(raw, first + 1)
            .ok_or_else(|| malformed(raw))?;

        let routing_id = ascii(&raw[..first])?;
        let message_type = ascii(&raw[first + 1..second])?;
        let payload = raw[second + 1..].to_vec();

        Ok(Frame {
            routing_id,
            message_type,
            payload,
        })
    }

    /// Serializes the frame back into the `routing_id SP message_type SP
    /// payload` wire shape used for outbound (push) messages.
    pub fn encode(routing_id: &str, message_type: &str, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(routing_id.len() + message_type.len() + payload.len() + 2);
        buf.extend_from_slice(routing_id.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(message_type.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(payload);
        buf
    }
}

#[inline]
fn find(raw: &[u8], from: usize) -> Option<usize> {
    raw[from..].iter().position(|&b| b == b' ').map(|i| i + from)
}

#[inline]
fn ascii(raw: &[u8]) -> ProxyResult<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| malformed(raw))
}

fn malformed(raw: &[u8]) -> ProxyError {
    ProxyError::Fatal(ErrorKind::Malformed(format!(
        "frame has fewer than three parts: {:?}",
        raw
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_two_spaces_only() {
        let frame = Frame::parse(b"951 Register hello world").unwrap();
        assert_eq!(frame.routing_id, "951");
        assert_eq!(frame.message_type, "Register");
        assert_eq!(frame.payload, b"hello world");
    }

    #[test]
    fn parse_rejects_fewer_than_three_parts() {
        assert!(Frame::parse(b"951 Register").is_err());
        assert!(Frame::parse(b"951").is_err());
    }

    #[test]
    fn encode_round_trips_through_parse() {
        let encoded = Frame::encode("real_951", "Input", b"\x01\x02raw");
        let frame = Frame::parse(&encoded).unwrap();
        assert_eq!(frame.routing_id, "real_951");
        assert_eq!(frame.message_type, "Input");
        assert_eq!(frame.payload, b"\x01\x02raw");
    }
}
