//! Wire frame model and its text codec
//!
//! Every frame is a five element JSON array:
//!
//! ```text
//! [join_ref | null, ref | null, topic, event, payload]
//! ```
//!
//! Replies carry `{"status": "...", "response": ...}` as their payload.

use crate::traits::error::{PhoenixError, Result};
use serde_json::{json, Value};
use std::fmt;

pub const PHX_CLOSE: &str = "phx_close";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_JOIN: &str = "phx_join";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_LEAVE: &str = "phx_leave";

/// Events whose membership is scoped by join ref
pub const LIFECYCLE_EVENTS: [&str; 5] = [PHX_CLOSE, PHX_ERROR, PHX_JOIN, PHX_REPLY, PHX_LEAVE];

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const HEARTBEAT_EVENT: &str = "heartbeat";

const REPLY_EVENT_PREFIX: &str = "chan_reply_";

static NO_RESPONSE: Value = Value::Null;

/// Is `event` one of the protocol lifecycle events
pub fn is_lifecycle_event(event: &str) -> bool {
    LIFECYCLE_EVENTS.contains(&event)
}

/// Synthetic event name a reply to `reference` is re-dispatched under
pub fn reply_event_name(reference: &str) -> String {
    format!("{REPLY_EVENT_PREFIX}{reference}")
}

/// Status of a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyStatus {
    Ok,
    Error,
    Timeout,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyStatus::Ok => "ok",
            ReplyStatus::Error => "error",
            ReplyStatus::Timeout => "timeout",
        }
    }

    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "ok" => Some(ReplyStatus::Ok),
            "error" => Some(ReplyStatus::Error),
            "timeout" => Some(ReplyStatus::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame, outbound or inbound
///
/// A `None` reference marks a server-initiated push rather than a reply.
/// The payload is passed through untouched; only the reply envelope's
/// `status` and `response` fields are ever read.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub join_ref: Option<String>,
    pub reference: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

impl Message {
    pub fn new(topic: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            join_ref: None,
            reference: None,
            topic: topic.into(),
            event: event.into(),
            payload,
        }
    }

    pub fn with_refs(mut self, join_ref: Option<String>, reference: Option<String>) -> Self {
        self.join_ref = join_ref;
        self.reference = reference;
        self
    }

    /// `[null, ref, "phoenix", "heartbeat", {}]`
    pub fn heartbeat(reference: impl Into<String>) -> Self {
        Self::new(PHOENIX_TOPIC, HEARTBEAT_EVENT, json!({}))
            .with_refs(None, Some(reference.into()))
    }

    /// Locally synthesized reply used when a push times out
    pub(crate) fn timeout_reply(
        topic: impl Into<String>,
        event: impl Into<String>,
        reference: Option<String>,
    ) -> Self {
        Self::new(
            topic,
            event,
            json!({ "status": ReplyStatus::Timeout.as_str(), "response": {} }),
        )
        .with_refs(None, reference)
    }

    /// Locally synthesized close notification
    pub(crate) fn lifecycle(
        topic: impl Into<String>,
        event: &str,
        join_ref: Option<String>,
    ) -> Self {
        Self::new(topic, event, json!({})).with_refs(join_ref, None)
    }

    /// Encode as a text frame; a null payload is sent as `{}`
    pub fn encode(&self) -> Result<String> {
        let payload = if self.payload.is_null() {
            json!({})
        } else {
            self.payload.clone()
        };
        let frame = (
            self.join_ref.as_deref(),
            self.reference.as_deref(),
            self.topic.as_str(),
            self.event.as_str(),
            payload,
        );
        serde_json::to_string(&frame).map_err(|e| PhoenixError::Encode(e.to_string()))
    }

    /// Decode one text frame
    pub fn decode(raw: &str) -> Result<Self> {
        let (join_ref, reference, topic, event, payload): (Value, Value, String, String, Value) =
            serde_json::from_str(raw)?;
        Ok(Self {
            join_ref: ref_field(join_ref)?,
            reference: ref_field(reference)?,
            topic,
            event,
            payload,
        })
    }

    /// Reply status read from the payload envelope, if any
    pub fn status(&self) -> Option<ReplyStatus> {
        self.payload
            .get("status")
            .and_then(Value::as_str)
            .and_then(ReplyStatus::parse)
    }

    /// The `response` field of a reply envelope (null when absent)
    pub fn response(&self) -> &Value {
        self.payload.get("response").unwrap_or(&NO_RESPONSE)
    }

    /// True for frames the server pushed without a request
    pub fn is_server_push(&self) -> bool {
        self.reference.is_none()
    }
}

fn ref_field(value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(PhoenixError::Decode(format!("invalid ref field: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_join() {
        let msg = Message::new("room:lobby", PHX_JOIN, Value::Null)
            .with_refs(Some("1".into()), Some("1".into()));
        assert_eq!(msg.encode().unwrap(), r#"["1","1","room:lobby","phx_join",{}]"#);
    }

    #[test]
    fn test_encode_heartbeat() {
        let msg = Message::heartbeat("7");
        assert_eq!(msg.encode().unwrap(), r#"[null,"7","phoenix","heartbeat",{}]"#);
    }

    #[test]
    fn test_frame_round_trip() {
        let msg = Message::new("room:lobby", "new_msg", json!({"body": "hi"}))
            .with_refs(Some("1".into()), Some("1".into()));
        let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.payload["body"], "hi");
    }

    #[test]
    fn test_decode_ok_reply() {
        let msg = Message::decode(
            r#"["1","1","room:lobby","phx_reply",{"status":"ok","response":{"id":3}}]"#,
        )
        .unwrap();
        assert_eq!(msg.status(), Some(ReplyStatus::Ok));
        assert_eq!(msg.response(), &json!({"id": 3}));
        assert!(!msg.is_server_push());
    }

    #[test]
    fn test_decode_server_push() {
        let msg = Message::decode(r#"[null,null,"room:lobby","new_msg",{"body":"hi"}]"#).unwrap();
        assert!(msg.is_server_push());
        assert_eq!(msg.join_ref, None);
        assert_eq!(msg.status(), None);
        assert!(msg.response().is_null());
    }

    #[test]
    fn test_decode_numeric_refs() {
        let msg = Message::decode(r#"[4,5,"room:lobby","phx_reply",{"status":"error"}]"#).unwrap();
        assert_eq!(msg.join_ref.as_deref(), Some("4"));
        assert_eq!(msg.reference.as_deref(), Some("5"));
        assert_eq!(msg.status(), Some(ReplyStatus::Error));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(Message::decode("not json").is_err());
        assert!(Message::decode(r#"["1","1","room:lobby"]"#).is_err());
        assert!(Message::decode(r#"[{},"1","room:lobby","x",{}]"#).is_err());
    }

    #[test]
    fn test_timeout_reply_shape() {
        let msg = Message::timeout_reply("room:lobby", reply_event_name("9"), Some("9".into()));
        assert_eq!(msg.event, "chan_reply_9");
        assert_eq!(msg.status(), Some(ReplyStatus::Timeout));
        assert_eq!(msg.response(), &json!({}));
    }

    #[test]
    fn test_lifecycle_events() {
        for event in LIFECYCLE_EVENTS {
            assert!(is_lifecycle_event(event));
        }
        assert!(!is_lifecycle_event("new_msg"));
        assert!(!is_lifecycle_event(HEARTBEAT_EVENT));
    }
}
