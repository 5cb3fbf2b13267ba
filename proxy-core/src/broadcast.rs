//! Server discovery over UDP broadcast: send a single-byte probe to every
//! candidate broadcast address in turn, decode a tag-length-value reply into
//! the three endpoint URLs the game server advertises (spec §4.3, §6).
use common::error::{ErrorKind, ProxyError, ProxyResult};
use common::logging::{self, Logger};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

pub const PROBE_BYTE: u8 = 0x31;

const TAG_PULLER: u8 = 0xA0;
const TAG_PUBLISHER: u8 = 0xA1;
const TAG_REPLIER: u8 = 0xA2;

/// The three transport URLs that identify the game server's sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTriple {
    pub push_address: String,
    pub subscribe_address: String,
    pub reply_address: String,
}

/// Decodes a raw broadcast reply into an [`EndpointTriple`], substituting the
/// literal `*` placeholder with the sender's source IP.
pub fn decode_reply(data: &[u8], sender_ip: Ipv4Addr) -> ProxyResult<EndpointTriple> {
    let (puller, rest) = take_tagged(data, TAG_PULLER)?;
    let (publisher, rest) = take_tagged(rest, TAG_PUBLISHER)?;
    let (replier, _rest) = take_tagged(rest, TAG_REPLIER)?;

    let substitute = |addr: String| addr.replace('*', &sender_ip.to_string());

    Ok(EndpointTriple {
        push_address: substitute(puller),
        subscribe_address: substitute(publisher),
        reply_address: substitute(replier),
    })
}

fn take_tagged(data: &[u8], expected_tag: u8) -> ProxyResult<(String, &[u8])> {
    if data.len() < 2 {
        return Err(malformed());
    }
    if data[0] != expected_tag {
        return Err(malformed());
    }
    let len = data[1] as usize;
    if data.len() < 2 + len {
        return Err(malformed());
    }
    let address = String::from_utf8(data[2..2 + len].to_vec()).map_err(|_| malformed())?;
    Ok((address, &data[2 + len..]))
}

fn malformed() -> ProxyError {
    ProxyError::Fatal(ErrorKind::Malformed("malformed broadcast reply".into()))
}

/// Every IPv4 broadcast address available on local interfaces, in reverse
/// enumeration order (spec §4.3).
pub fn candidate_broadcast_addresses() -> Vec<Ipv4Addr> {
    let mut addrs: Vec<Ipv4Addr> = if_addrs::get_if_addrs()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) => v4.broadcast,
            if_addrs::IfAddr::V6(_) => None,
        })
        .collect();
    addrs.reverse();
    addrs
}

/// One-shot UDP broadcast client. Sends the single-byte probe `0x31` up to
/// `retries` times, waiting `timeout` per try, across every candidate
/// broadcast address, until one replies.
pub struct Broadcast {
    port: u16,
    retries: u32,
    timeout: Duration,
    log: Logger,
}

impl Broadcast {
    pub fn new(port: u16, retries: u32, timeout: Duration, log: &Logger) -> Broadcast {
        Broadcast {
            port,
            retries,
            timeout,
            log: log.new(logging::o!()),
        }
    }

    /// Runs one full discovery cycle across every candidate address.
    /// `Ok(None)` means "not found" — normal, not fatal (spec §7).
    pub fn discover(&self) -> ProxyResult<Option<EndpointTriple>> {
        for broadcast_ip in candidate_broadcast_addresses() {
            if let Some(triple) = self.probe(broadcast_ip)? {
                return Ok(Some(triple));
            }
        }
        Ok(None)
    }

    /// Probes a single broadcast address, retrying up to `self.retries`
    /// times. Used both by full discovery and by the pinger's liveness
    /// check against an already-known server.
    pub fn probe(&self, broadcast_ip: Ipv4Addr) -> ProxyResult<Option<EndpointTriple>> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(self.timeout))?;

        let group = SocketAddr::from((broadcast_ip, self.port));

        for _ in 0..self.retries {
            socket.send_to(&[PROBE_BYTE], group)?;

            let mut buf = [0u8; 512];
            match socket.recv_from(&mut buf) {
                Ok((len, SocketAddr::V4(sender))) => {
                    let triple = decode_reply(&buf[..len], *sender.ip())?;
                    return Ok(Some(triple));
                }
                Ok((_, SocketAddr::V6(_))) => continue,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        logging::info!(self.log, "no reply from broadcast group"; "group" => group.to_string());
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_reply_substituting_sender_ip() {
        let mut data = Vec::new();
        data.push(TAG_PULLER);
        data.push(b"tcp://*:9001".len() as u8);
        data.extend_from_slice(b"tcp://*:9001");
        data.push(TAG_PUBLISHER);
        data.push(b"tcp://*:9000".len() as u8);
        data.extend_from_slice(b"tcp://*:9000");
        data.push(TAG_REPLIER);
        data.push(b"tcp://*:9004".len() as u8);
        data.extend_from_slice(b"tcp://*:9004");

        let triple = decode_reply(&data, "10.0.0.7".parse().unwrap()).unwrap();
        assert_eq!(
            triple,
            EndpointTriple {
                push_address: "tcp://10.0.0.7:9001".into(),
                subscribe_address: "tcp://10.0.0.7:9000".into(),
                reply_address: "tcp://10.0.0.7:9004".into(),
            }
        );
    }

    #[test]
    fn rejects_wrong_tag_order() {
        let mut data = Vec::new();
        data.push(TAG_PUBLISHER);
        data.push(0);
        assert!(decode_reply(&data, "1.2.3.4".parse().unwrap()).is_err());
    }
}
