//! Physical (or stub) robot device behind a uniform interface (spec §3, §4.9).
//! A `UdpRobot` learns its peer address from the first datagram it receives
//! on its owned socket ; until then it is not `ready` and commands are
//! dropped.
use common::error::ProxyResult;
use common::logging::{self, Logger};
use std::net::{SocketAddr, UdpSocket};

/// Sentinel used in the UDP wire protocol; the trailing `)` is literal and
/// preserved verbatim for compatibility with the firmware that parses it
/// (spec §6, open question — not a typo).
fn fire_command(fire1: bool, fire2: bool) -> String {
    format!("fire {} {})", fire1 as u8, fire2 as u8)
}

fn move_command(left: f32, right: f32) -> String {
    // Truncating conversion: round() before casting, matching the explicit
    // rounding policy decision recorded in DESIGN.md for the open question
    // on -1..1 -> -255..255 mapping.
    let l = (left * 255.0).round() as i32;
    let r = (right * 255.0).round() as i32;
    format!("move {} {}", l, r)
}

pub enum Device {
    /// No-op stand-in used before a socket is assigned, or in tests.
    Stub,
    UdpRobot(UdpRobot),
}

impl Device {
    pub fn ready(&self) -> bool {
        match self {
            Device::Stub => false,
            Device::UdpRobot(robot) => robot.ready(),
        }
    }

    pub fn move_to(&mut self, left: f32, right: f32) -> ProxyResult<()> {
        match self {
            Device::Stub => Ok(()),
            Device::UdpRobot(robot) => robot.send(&move_command(left, right)),
        }
    }

    pub fn fire(&mut self, fire1: bool, fire2: bool) -> ProxyResult<()> {
        match self {
            Device::Stub => Ok(()),
            Device::UdpRobot(robot) => robot.send(&fire_command(fire1, fire2)),
        }
    }

    pub fn stop(&mut self) -> ProxyResult<()> {
        self.move_to(0.0, 0.0)
    }

    /// Polls for the datagram that fixes a `UdpRobot`'s address; no-op for
    /// `Stub`. Call once per tick before reading `ready`.
    pub fn poll(&mut self) {
        if let Device::UdpRobot(robot) = self {
            robot.learn_address();
        }
    }

    pub fn address(&self) -> Option<SocketAddr> {
        match self {
            Device::Stub => None,
            Device::UdpRobot(robot) => robot.address,
        }
    }
}

/// Owns exactly one socket drawn from the `SocketsLister` pool.
pub struct UdpRobot {
    socket: UdpSocket,
    address: Option<SocketAddr>,
    log: Logger,
}

impl UdpRobot {
    pub fn new(socket: UdpSocket, log: &Logger) -> UdpRobot {
        UdpRobot {
            socket,
            address: None,
            log: log.new(logging::o!()),
        }
    }

    pub fn ready(&self) -> bool {
        self.address.is_some()
    }

    /// Non-blocking poll for the first datagram, which fixes `address`.
    /// Call once per tick before relying on `ready`.
    pub fn learn_address(&mut self) {
        if self.address.is_some() {
            return;
        }
        let mut buf = [0u8; 1];
        if let Ok((_, from)) = self.socket.recv_from(&mut buf) {
            logging::info!(self.log, "learned robot address"; "address" => from.to_string());
            self.address = Some(from);
        }
    }

    fn send(&self, command: &str) -> ProxyResult<()> {
        if let Some(address) = self.address {
            if let Err(e) = self.socket.send_to(command.as_bytes(), address) {
                logging::warn!(self.log, "device send failed"; "error" => e.to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_command_rounds_and_scales_to_the_255_band() {
        assert_eq!(move_command(0.5, -0.5), "move 128 -128");
        assert_eq!(move_command(1.0, -1.0), "move 255 -255");
        assert_eq!(move_command(0.0, 0.0), "move 0 0");
    }

    #[test]
    fn fire_command_keeps_the_literal_trailing_paren() {
        assert_eq!(fire_command(true, false), "fire 1 0)");
    }

    #[test]
    fn stub_device_is_never_ready_and_commands_are_no_ops() {
        let mut stub = Device::Stub;
        assert!(!stub.ready());
        assert!(stub.move_to(1.0, 1.0).is_ok());
        assert!(stub.fire(true, true).is_ok());
    }
}
