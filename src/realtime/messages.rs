//! Realtime Message Types
//!
//! Frames exchanged with the realtime service (Phoenix channel framing) and
//! the broadcast payload carrying AI suggestions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::Suggestion;

/// Phoenix event names
pub mod events {
    pub const JOIN: &str = "phx_join";
    pub const LEAVE: &str = "phx_leave";
    pub const REPLY: &str = "phx_reply";
    pub const ERROR: &str = "phx_error";
    pub const CLOSE: &str = "phx_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const BROADCAST: &str = "broadcast";
}

/// Topic used by heartbeats
pub const PHOENIX_TOPIC: &str = "phoenix";

/// Channel topic for a broadcast topic name (`event-changes` → `realtime:event-changes`)
pub fn channel_topic(topic: &str) -> String {
    format!("realtime:{}", topic)
}

/// One frame on the socket, in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    /// Join a broadcast channel without receiving our own broadcasts
    pub fn join(topic: &str, reference: &str) -> Self {
        Self {
            topic: channel_topic(topic),
            event: events::JOIN.to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false, "ack": false },
                    "presence": { "key": "" }
                }
            }),
            reference: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: &str) -> Self {
        Self {
            topic: channel_topic(topic),
            event: events::LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: events::HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Classify an inbound frame for `topic`
    pub fn inbound(&self, topic: &str) -> Inbound {
        match self.event.as_str() {
            events::REPLY => Inbound::Reply {
                reference: self.reference.clone(),
                ok: self.payload.get("status").and_then(Value::as_str) == Some("ok"),
                response: self.payload.get("response").cloned().unwrap_or(Value::Null),
            },
            _ if self.topic != channel_topic(topic) => Inbound::Other,
            events::BROADCAST => {
                match serde_json::from_value::<BroadcastMessage>(self.payload.clone()) {
                    Ok(message) => Inbound::Broadcast(message),
                    Err(_) => Inbound::Other,
                }
            }
            events::ERROR => Inbound::ChannelError,
            events::CLOSE => Inbound::ChannelClosed,
            _ => Inbound::Other,
        }
    }
}

/// Inbound frame, classified
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to a join, leave or heartbeat
    Reply {
        reference: Option<String>,
        ok: bool,
        response: Value,
    },
    /// Broadcast on our channel
    Broadcast(BroadcastMessage),
    /// Server reported the channel crashed
    ChannelError,
    /// Server closed the channel
    ChannelClosed,
    /// Anything else (presence, postgres changes, other topics)
    Other,
}

/// Payload of a `broadcast` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Broadcast event name, e.g. `shout`
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Application payload of a suggestion broadcast: `{suggestion?: {title?, description?, rationale?}}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionPayload {
    pub suggestion: Option<Suggestion>,
}

impl SuggestionPayload {
    /// Lenient parse: a missing, non-object, or malformed `suggestion` reads as absent
    pub fn from_value(value: &Value) -> Self {
        let suggestion = value
            .get("suggestion")
            .filter(|s| s.is_object())
            .and_then(|s| serde_json::from_value(s.clone()).ok());
        Self { suggestion }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_frame_serialize() {
        let json = Frame::join("event-changes", "1").to_text().unwrap();
        assert!(json.contains("\"topic\":\"realtime:event-changes\""));
        assert!(json.contains("\"event\":\"phx_join\""));
        assert!(json.contains("\"ref\":\"1\""));
        assert!(json.contains("\"self\":false"));
    }

    #[test]
    fn test_heartbeat_frame() {
        let frame = Frame::heartbeat("7");
        assert_eq!(frame.topic, "phoenix");
        assert_eq!(frame.event, "heartbeat");
    }

    #[test]
    fn test_classify_broadcast() {
        let text = r#"{
            "topic": "realtime:event-changes",
            "event": "broadcast",
            "payload": {"type": "broadcast", "event": "shout", "payload": {"suggestion": {"title": "T"}}},
            "ref": null
        }"#;
        let frame: Frame = serde_json::from_str(text).unwrap();

        match frame.inbound("event-changes") {
            Inbound::Broadcast(message) => {
                assert_eq!(message.event, "shout");
                let payload = SuggestionPayload::from_value(&message.payload);
                assert_eq!(payload.suggestion.unwrap().title.as_deref(), Some("T"));
            }
            other => panic!("Expected Broadcast, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_on_other_topic_ignored() {
        let frame = Frame {
            topic: "realtime:other".to_string(),
            event: "broadcast".to_string(),
            payload: json!({"event": "shout", "payload": {}}),
            reference: None,
        };
        assert_eq!(frame.inbound("event-changes"), Inbound::Other);
    }

    #[test]
    fn test_classify_reply() {
        let text = r#"{"topic":"realtime:event-changes","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        let frame: Frame = serde_json::from_str(text).unwrap();
        match frame.inbound("event-changes") {
            Inbound::Reply { reference, ok, .. } => {
                assert_eq!(reference.as_deref(), Some("1"));
                assert!(ok);
            }
            other => panic!("Expected Reply, got {:?}", other),
        }
    }

    #[test]
    fn test_suggestion_payload_lenient() {
        assert_eq!(
            SuggestionPayload::from_value(&json!({})),
            SuggestionPayload::default()
        );
        assert_eq!(
            SuggestionPayload::from_value(&json!({"suggestion": "plain text"})),
            SuggestionPayload::default()
        );
        let payload = SuggestionPayload::from_value(&json!({
            "user_id": "u1",
            "changes": ["Added event"],
            "suggestion": {"title": "Walk", "description": "D", "rationale": "R"}
        }));
        let suggestion = payload.suggestion.unwrap();
        assert_eq!(suggestion.description.as_deref(), Some("D"));
        assert_eq!(suggestion.rationale.as_deref(), Some("R"));
    }
}
