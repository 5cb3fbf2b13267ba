//! Compile-time mapping from message-type name to a decoder. Used only by
//! `MessageHub::step` to decide whether a frame is known and to parse it.
//! Unknown types are logged and dropped (see `message_hub.rs`).
use crate::messages::{InputMsg, Message, RegisterMsg, RegisteredMsg};
use common::error::ProxyResult;
use hashbrown::HashMap;
use lazy_static::lazy_static;

pub const REGISTER: &str = "Register";
pub const REGISTERED: &str = "Registered";
pub const INPUT: &str = "Input";

type Decoder = fn(&[u8]) -> ProxyResult<Message>;

lazy_static! {
    pub static ref REGISTRY: HashMap<&'static str, Decoder> = {
        let mut map: HashMap<&'static str, Decoder> = HashMap::new();
        map.insert(REGISTER, |raw| RegisterMsg::decode(raw).map(Message::Register));
        map.insert(REGISTERED, |raw| {
            RegisteredMsg::decode(raw).map(Message::Registered)
        });
        map.insert(INPUT, |raw| InputMsg::decode(raw).map(Message::Input));
        map
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_all_three_types() {
        assert!(REGISTRY.contains_key(REGISTER));
        assert!(REGISTRY.contains_key(REGISTERED));
        assert!(REGISTRY.contains_key(INPUT));
    }

    #[test]
    fn registry_decodes_through_the_right_constructor() {
        let msg = RegisteredMsg {
            robot_id: "real_951".into(),
        };
        let decoded = (REGISTRY[REGISTERED])(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, Message::Registered(msg));
    }
}
