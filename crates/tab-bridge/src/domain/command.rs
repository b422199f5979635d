//! Outbound messages written to the browser.
//!
//! Wire shape of a command: `{"action": <name>, "id": <id>, ...fields}`.

use crate::domain::correlation::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Keys owned by the envelope; never taken from caller-supplied fields.
const RESERVED_KEYS: [&str; 2] = ["action", "id"];

/// Browser-side action a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// List open tabs.
    GetTabs,
    /// Activate an existing tab.
    SwitchTab,
    /// Open a new tab.
    CreateTab,
    /// Forward a tool call to the extension.
    CallMcp,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::GetTabs,
        Action::SwitchTab,
        Action::CreateTab,
        Action::CallMcp,
    ];

    /// Name used in the `action` field on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetTabs => "getTabs",
            Action::SwitchTab => "switchTab",
            Action::CreateTab => "createTab",
            Action::CallMcp => "callMcp",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command sent to the browser. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    pub id: RequestId,
    /// Action-specific fields, flattened next to `action` and `id`.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Command {
    /// Build a command. Caller fields named `action` or `id` are dropped so
    /// they cannot overwrite the envelope.
    pub fn new(action: Action, id: RequestId, mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            fields.remove(key);
        }
        Self { action, id, fields }
    }
}

/// Anything the bridge writes on the outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// Correlated command awaiting a reply.
    Command(Command),
    /// Answer to a liveness probe: `{"reply": "pong"}`.
    Pong { reply: &'static str },
}

impl OutboundMessage {
    pub fn pong() -> Self {
        OutboundMessage::Pong { reply: "pong" }
    }
}

impl From<Command> for OutboundMessage {
    fn from(cmd: Command) -> Self {
        OutboundMessage::Command(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_command_wire_shape() {
        let id = RequestId::from_wire("req-1").unwrap();
        let cmd = Command::new(Action::SwitchTab, id, fields(json!({"tabId": 3})));
        let value = serde_json::to_value(OutboundMessage::from(cmd)).unwrap();
        assert_eq!(
            value,
            json!({"action": "switchTab", "id": "req-1", "tabId": 3})
        );
    }

    #[test]
    fn test_reserved_fields_cannot_override_envelope() {
        let id = RequestId::from_wire("req-2").unwrap();
        let cmd = Command::new(
            Action::CreateTab,
            id,
            fields(json!({"id": "spoofed", "action": "getTabs", "url": "https://a.example"})),
        );
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["id"], "req-2");
        assert_eq!(value["action"], "createTab");
        assert_eq!(value["url"], "https://a.example");
    }

    #[test]
    fn test_pong_wire_shape() {
        let value = serde_json::to_value(OutboundMessage::pong()).unwrap();
        assert_eq!(value, json!({"reply": "pong"}));
    }

    #[test]
    fn test_action_names_match_serde() {
        for action in Action::ALL {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
        }
    }
}
