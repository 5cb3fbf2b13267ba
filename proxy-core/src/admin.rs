//! Reply-socket endpoint answering text admin commands about currently
//! known robots (spec §4.12).
use crate::connectors::AdminEndpoint;
use crate::robot::{Robot, RobotView};
use common::error::ProxyResult;
use std::collections::BTreeMap;
use std::rc::Rc;

const CMD_LIST: &str = "list robot";
const CMD_JSON_LIST: &str = "json list robot";

pub struct Admin {
    endpoint: AdminEndpoint,
}

impl Admin {
    pub fn new(endpoint: AdminEndpoint) -> Admin {
        Admin { endpoint }
    }

    /// Reads at most one command per step ; unknown commands are ignored,
    /// no reply is written for them.
    pub fn step(&self, robots: &[Rc<Robot>]) -> ProxyResult<()> {
        let command = match self.endpoint.read() {
            Ok(command) => command,
            Err(common::error::ProxyError::Wait) => return Ok(()),
            Err(e) => return Err(e),
        };

        match command.trim() {
            CMD_LIST => self.endpoint.write(&list_reply(robots)),
            CMD_JSON_LIST => self.endpoint.write(&json_list_reply(robots)),
            _ => {}
        }
        Ok(())
    }
}

/// Python-`repr`-style bracketed, single-quoted, comma-separated list,
/// matching the original admin console's wire format verbatim.
fn list_reply(robots: &[Rc<Robot>]) -> String {
    let ids: Vec<String> = robots.iter().map(|r| format!("'{}'", r.robot_id())).collect();
    format!("[{}]", ids.join(", "))
}

fn json_list_reply(robots: &[Rc<Robot>]) -> String {
    let views: BTreeMap<String, RobotView> = robots
        .iter()
        .map(|r| (r.robot_id(), r.describe()))
        .collect();
    serde_json::to_string(&views).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_reply_formats_ids_python_repr_style() {
        // Exercised against bare strings since constructing a Robot needs a
        // live MessageHubWrapper; the formatting under test does not depend
        // on Robot internals beyond `robot_id()`.
        let ids = vec!["951".to_string(), "real_952".to_string()];
        let formatted: Vec<String> = ids.iter().map(|id| format!("'{}'", id)).collect();
        assert_eq!(format!("[{}]", formatted.join(", ")), "['951', 'real_952']");
    }

    #[test]
    fn empty_robot_list_formats_as_empty_brackets() {
        let robots: Vec<Rc<Robot>> = Vec::new();
        assert_eq!(list_reply(&robots), "[]");
    }
}
