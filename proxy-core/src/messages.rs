//! Concrete payload encodings for the three message types the core
//! recognises. `spec.md` treats the wire format of payloads as fixed by an
//! external schema and out of the core's concern; this module is the
//! substitution needed to get a compiling, testable repo, using the same
//! manual `byteorder` read/write style the teacher uses for its own framed
//! structures (`t51core/src/net/frame.rs`, `lib/flux/src/contract.rs`).
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use common::error::{ErrorKind, ProxyError, ProxyResult};
use std::io::{Cursor, Read, Write};

/// Robot -> server: ask to be registered, carrying a temporary id chosen by
/// the robot/proxy and an image placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMsg {
    pub temporary_robot_id: String,
    pub image: String,
}

/// Server -> robot: confirms registration and assigns the authoritative id.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredMsg {
    pub robot_id: String,
}

/// Server -> robot: movement/fire command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputMsg {
    pub move_left: f32,
    pub move_right: f32,
    pub fire1: bool,
    pub fire2: bool,
}

fn write_str<W: Write>(mut stream: W, s: &str) -> ProxyResult<()> {
    let bytes = s.as_bytes();
    if bytes.len() > u8::MAX as usize {
        return Err(ProxyError::Fatal(ErrorKind::Malformed(format!(
            "string field too long: {} bytes",
            bytes.len()
        ))));
    }
    stream.write_u8(bytes.len() as u8)?;
    stream.write_all(bytes)?;
    Ok(())
}

fn read_str<R: Read>(mut stream: R) -> ProxyResult<String> {
    let len = stream.read_u8()? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| ProxyError::Fatal(ErrorKind::Malformed("non-ascii string field".into())))
}

impl RegisterMsg {
    pub fn encode(&self) -> ProxyResult<Vec<u8>> {
        let mut buf = Vec::new();
        write_str(&mut buf, &self.temporary_robot_id)?;
        write_str(&mut buf, &self.image)?;
        Ok(buf)
    }

    pub fn decode(raw: &[u8]) -> ProxyResult<RegisterMsg> {
        let mut stream = Cursor::new(raw);
        let temporary_robot_id = read_str(&mut stream)?;
        let image = read_str(&mut stream)?;
        Ok(RegisterMsg {
            temporary_robot_id,
            image,
        })
    }
}

impl RegisteredMsg {
    pub fn encode(&self) -> ProxyResult<Vec<u8>> {
        let mut buf = Vec::new();
        write_str(&mut buf, &self.robot_id)?;
        Ok(buf)
    }

    pub fn decode(raw: &[u8]) -> ProxyResult<RegisteredMsg> {
        let mut stream = Cursor::new(raw);
        let robot_id = read_str(&mut stream)?;
        Ok(RegisteredMsg { robot_id })
    }
}

impl InputMsg {
    pub const SIZE: usize = 10;

    pub fn encode(&self) -> ProxyResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_f32::<LittleEndian>(self.move_left)?;
        buf.write_f32::<LittleEndian>(self.move_right)?;
        buf.write_u8(self.fire1 as u8)?;
        buf.write_u8(self.fire2 as u8)?;
        Ok(buf)
    }

    pub fn decode(raw: &[u8]) -> ProxyResult<InputMsg> {
        if raw.len() < Self::SIZE {
            return Err(ProxyError::Fatal(ErrorKind::Malformed(
                "Input payload too short".into(),
            )));
        }
        let mut stream = Cursor::new(raw);
        let move_left = stream.read_f32::<LittleEndian>()?;
        let move_right = stream.read_f32::<LittleEndian>()?;
        let fire1 = stream.read_u8()? != 0;
        let fire2 = stream.read_u8()? != 0;
        Ok(InputMsg {
            move_left,
            move_right,
            fire1,
            fire2,
        })
    }
}

/// Decoded form of any message the registry recognises, handed to listener
/// callbacks by `MessageHub::step`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Register(RegisterMsg),
    Registered(RegisteredMsg),
    Input(InputMsg),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_round_trips() {
        let msg = RegisterMsg {
            temporary_robot_id: "951".into(),
            image: "no image".into(),
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(RegisterMsg::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn registered_round_trips() {
        let msg = RegisteredMsg {
            robot_id: "real_951".into(),
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(RegisteredMsg::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn input_round_trips() {
        let msg = InputMsg {
            move_left: 0.5,
            move_right: -0.5,
            fire1: true,
            fire2: false,
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(InputMsg::decode(&encoded).unwrap(), msg);
    }
}
