//! Classification of decoded inbound frames.

use crate::domain::correlation::RequestId;
use serde_json::Value;

/// What the dispatch loop should do with one decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{"cmd": "ping"}`: answer with a pong, no correlation.
    Ping,
    /// Carries an identifier and a payload field.
    Reply { id: RequestId, payload: Value },
    /// Any other shape (keep-alives, unknown kinds).
    Other(Value),
}

impl InboundMessage {
    /// Classify a decoded message.
    ///
    /// `payload_fields` lists the keys accepted as the reply payload, checked
    /// in order; the first one present wins.
    pub fn classify(value: Value, payload_fields: &[String]) -> Self {
        let Value::Object(mut map) = value else {
            return InboundMessage::Other(value);
        };

        if map.get("cmd").and_then(Value::as_str) == Some("ping") {
            return InboundMessage::Ping;
        }

        let id = map
            .get("id")
            .and_then(Value::as_str)
            .and_then(RequestId::from_wire);
        let field = payload_fields.iter().find(|f| map.contains_key(f.as_str()));

        match (id, field) {
            (Some(id), Some(field)) => {
                let payload = map.remove(field.as_str()).unwrap_or(Value::Null);
                InboundMessage::Reply { id, payload }
            }
            _ => InboundMessage::Other(Value::Object(map)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Vec<String> {
        vec!["tabs".to_string(), "result".to_string()]
    }

    #[test]
    fn test_ping() {
        assert_eq!(
            InboundMessage::classify(json!({"cmd": "ping"}), &fields()),
            InboundMessage::Ping
        );
    }

    #[test]
    fn test_tabs_reply() {
        let msg = InboundMessage::classify(
            json!({"id": "abc", "tabs": [{"title": "A"}]}),
            &fields(),
        );
        assert_eq!(
            msg,
            InboundMessage::Reply {
                id: RequestId::from_wire("abc").unwrap(),
                payload: json!([{"title": "A"}]),
            }
        );
    }

    #[test]
    fn test_result_reply_and_null_payload() {
        let msg = InboundMessage::classify(json!({"id": "x", "result": null}), &fields());
        assert!(matches!(msg, InboundMessage::Reply { payload: Value::Null, .. }));
    }

    #[test]
    fn test_first_listed_field_wins() {
        let msg = InboundMessage::classify(
            json!({"id": "x", "result": 1, "tabs": 2}),
            &fields(),
        );
        assert!(matches!(msg, InboundMessage::Reply { payload, .. } if payload == json!(2)));
    }

    #[test]
    fn test_unrecognized_shapes_are_other() {
        for value in [
            json!({"id": "x"}),
            json!({"tabs": []}),
            json!({"id": 7, "tabs": []}),
            json!({"id": "", "tabs": []}),
            json!({"cmd": "pong"}),
            json!([1, 2, 3]),
            json!("ping"),
        ] {
            assert!(matches!(
                InboundMessage::classify(value, &fields()),
                InboundMessage::Other(_)
            ));
        }
    }
}
