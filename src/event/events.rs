use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::shared::FanoutError;

/// An application event published by a producer
///
/// Consumed once per dispatch invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Connection-lifecycle kind of a transport frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportEventType {
    Connect,
    Disconnect,
    Message,
}

/// Connect/disconnect/message frame forwarded by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportFrame {
    pub connection_id: String,
    #[serde(default)]
    pub endpoint: String,
    pub event_type: TransportEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Everything that can arrive at the inbound boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Transport(TransportFrame),
    Application(Event),
}

impl InboundEvent {
    /// Classify a raw inbound payload
    ///
    /// Objects carrying connection-lifecycle fields are transport frames;
    /// objects with a string `name` (or `type`) are application events.
    /// Anything else fails fast with `MalformedEvent`.
    pub fn from_value(value: Value) -> Result<Self, FanoutError> {
        let Value::Object(mut fields) = value else {
            return Err(FanoutError::malformed("expected a JSON object"));
        };

        if fields.contains_key("connectionId") || fields.contains_key("eventType") {
            let frame: TransportFrame = serde_json::from_value(Value::Object(fields))
                .map_err(|e| FanoutError::malformed(format!("invalid transport frame: {}", e)))?;
            return Ok(InboundEvent::Transport(frame));
        }

        // `type` names the event only when `name` is absent
        if !fields.contains_key("name") {
            if let Some(name) = fields.remove("type") {
                fields.insert("name".to_string(), name);
            }
        }

        let event: Event = serde_json::from_value(Value::Object(fields))
            .map_err(|e| FanoutError::malformed(format!("invalid event: {}", e)))?;
        if event.name.trim().is_empty() {
            return Err(FanoutError::malformed("event name is empty"));
        }

        Ok(InboundEvent::Application(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_parses_application_event() {
        let inbound =
            InboundEvent::from_value(json!({"name": "chat", "data": {"text": "hi"}})).unwrap();
        assert_eq!(
            inbound,
            InboundEvent::Application(Event::new("chat", json!({"text": "hi"})))
        );
    }

    #[test]
    fn test_type_is_accepted_as_event_name() {
        let inbound = InboundEvent::from_value(json!({"type": "chat"})).unwrap();
        assert_eq!(
            inbound,
            InboundEvent::Application(Event::new("chat", Value::Null))
        );
    }

    #[test]
    fn test_name_wins_over_type() {
        let inbound = InboundEvent::from_value(
            json!({"name": "chat", "type": "legacy", "data": {"text": "hi"}}),
        )
        .unwrap();
        assert_eq!(
            inbound,
            InboundEvent::Application(Event::new("chat", json!({"text": "hi"})))
        );
    }

    #[test]
    fn test_parses_transport_frame() {
        let inbound = InboundEvent::from_value(json!({
            "connectionId": "c1",
            "endpoint": "wss://example",
            "eventType": "MESSAGE",
            "body": "{\"type\":\"connection_init\"}"
        }))
        .unwrap();

        let InboundEvent::Transport(frame) = inbound else {
            panic!("expected transport frame");
        };
        assert_eq!(frame.connection_id, "c1");
        assert_eq!(frame.event_type, TransportEventType::Message);
        assert!(frame.body.is_some());
    }

    #[rstest]
    #[case(json!("just a string"))]
    #[case(json!([1, 2, 3]))]
    #[case(json!({"data": {}}))]
    #[case(json!({"name": 42}))]
    #[case(json!({"name": "  "}))]
    #[case(json!({"connectionId": "c1", "eventType": "EXPLODE"}))]
    #[case(json!({"eventType": "CONNECT"}))]
    fn test_malformed_shapes_fail_fast(#[case] raw: Value) {
        let result = InboundEvent::from_value(raw);
        assert!(matches!(result, Err(FanoutError::MalformedEvent(_))));
    }

    #[test]
    fn test_event_type_display_round_trips() {
        assert_eq!(TransportEventType::Disconnect.to_string(), "DISCONNECT");
        assert_eq!(
            TransportEventType::from_str("CONNECT").unwrap(),
            TransportEventType::Connect
        );
    }
}
