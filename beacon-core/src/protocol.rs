//! Wire frames exchanged over the notification socket
//!
//! The server speaks JSON text frames tagged by a `type` field. Only the
//! liveness probe is ever sent; inbound frames are decoded leniently so that
//! unknown kinds can be added server-side without breaking subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Title used when a notification frame carries none.
pub const FALLBACK_TITLE: &str = "New Notification";

/// Type tag of the server's liveness response.
pub const PONG_TYPE: &str = "pong";

/// Frames sent from the subscriber to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Liveness probe
    Ping,
}

impl ClientFrame {
    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Which notification frame type a payload came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Notification,
    SendNotification,
}

impl NotificationKind {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "notification" => Some(Self::Notification),
            "send_notification" => Some(Self::SendNotification),
            _ => None,
        }
    }
}

/// Normalized notification handed to the sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Free-form metadata from the server (e.g. `{"time": "..."}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    /// When the frame was decoded locally
    pub received_at: DateTime<Utc>,
}

impl NotificationPayload {
    /// The server-supplied `extra.time`, if present and a string.
    pub fn time(&self) -> Option<&str> {
        self.extra.as_ref()?.get("time")?.as_str()
    }
}

/// Result of decoding one inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A notification to deliver
    Notification(NotificationPayload),
    /// Liveness response; dropped
    Pong,
    /// Valid JSON of a kind this subscriber does not handle
    Unrecognized(Option<String>),
}

/// Decode a raw text frame.
///
/// Only unparsable text is an error. A notification frame is always
/// normalized; fields that are absent, empty or not strings fall back.
pub fn decode_frame(text: &str) -> Result<InboundFrame, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Ok(InboundFrame::Unrecognized(None));
    };
    if kind == PONG_TYPE {
        return Ok(InboundFrame::Pong);
    }
    let Some(kind) = NotificationKind::from_type(kind) else {
        return Ok(InboundFrame::Unrecognized(Some(kind.to_string())));
    };

    Ok(InboundFrame::Notification(normalize(kind, &value)))
}

fn normalize(kind: NotificationKind, value: &Value) -> NotificationPayload {
    let title = text_field(value, "title").unwrap_or(FALLBACK_TITLE);
    let message = text_field(value, "message").unwrap_or_default();
    NotificationPayload {
        kind,
        title: title.to_string(),
        message: message.to_string(),
        extra: value.get("extra").filter(|v| !v.is_null()).cloned(),
        received_at: Utc::now(),
    }
}

/// Top-level `key`, else `data.key`; only non-empty strings count.
fn text_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    let non_empty = |v: &'a Value| v.as_str().filter(|s| !s.is_empty());
    value
        .get(key)
        .and_then(non_empty)
        .or_else(|| value.get("data")?.get(key).and_then(non_empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(text: &str) -> NotificationPayload {
        match decode_frame(text).unwrap() {
            InboundFrame::Notification(payload) => payload,
            other => panic!("Expected Notification, got {:?}", other),
        }
    }

    #[test]
    fn ping_encodes_as_typed_json() {
        let frame = ClientFrame::Ping.encode().unwrap();
        assert_eq!(frame, r#"{"type":"ping"}"#);
        let parsed: ClientFrame = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed, ClientFrame::Ping);
    }

    #[test]
    fn pong_is_recognized() {
        assert_eq!(decode_frame(r#"{"type":"pong"}"#).unwrap(), InboundFrame::Pong);
    }

    #[test]
    fn top_level_title_and_message() {
        let payload = notification(r#"{"type":"notification","title":"T","message":"M"}"#);
        assert_eq!(payload.kind, NotificationKind::Notification);
        assert_eq!(payload.title, "T");
        assert_eq!(payload.message, "M");
        assert!(payload.extra.is_none());
    }

    #[test]
    fn nested_data_title_is_used_when_top_level_missing() {
        let payload = notification(r#"{"type":"notification","data":{"title":"T2"}}"#);
        assert_eq!(payload.title, "T2");
        assert_eq!(payload.message, "");
    }

    #[test]
    fn send_notification_kind_is_accepted() {
        let payload = notification(
            r#"{"type":"send_notification","data":{"title":"Leave approved","message":"Enjoy"}}"#,
        );
        assert_eq!(payload.kind, NotificationKind::SendNotification);
        assert_eq!(payload.title, "Leave approved");
        assert_eq!(payload.message, "Enjoy");
    }

    #[test]
    fn missing_title_falls_back() {
        let payload = notification(r#"{"type":"notification"}"#);
        assert_eq!(payload.title, FALLBACK_TITLE);
        assert_eq!(payload.message, "");
    }

    #[test]
    fn empty_top_level_title_falls_through_to_data() {
        let payload = notification(r#"{"type":"notification","title":"","data":{"title":"Inner"}}"#);
        assert_eq!(payload.title, "Inner");
    }

    #[test]
    fn extra_is_passed_through() {
        let payload = notification(
            r#"{"type":"notification","title":"Meeting","extra":{"time":"10:30","room":"B2"}}"#,
        );
        assert_eq!(payload.time(), Some("10:30"));
        assert_eq!(payload.extra.unwrap()["room"], "B2");
    }

    #[test]
    fn unknown_kind_is_unrecognized() {
        assert_eq!(
            decode_frame(r#"{"type":"task_update","id":3}"#).unwrap(),
            InboundFrame::Unrecognized(Some("task_update".into()))
        );
    }

    #[test]
    fn untyped_json_is_unrecognized() {
        assert_eq!(decode_frame("[1,2]").unwrap(), InboundFrame::Unrecognized(None));
        assert_eq!(
            decode_frame(r#"{"type":7}"#).unwrap(),
            InboundFrame::Unrecognized(None)
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = decode_frame("connection established").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn wrong_field_types_fall_back() {
        let payload = notification(r#"{"type":"notification","title":42}"#);
        assert_eq!(payload.title, FALLBACK_TITLE);

        let payload = notification(r#"{"type":"notification","title":"T","data":"oops"}"#);
        assert_eq!(payload.title, "T");
        assert_eq!(payload.message, "");

        let payload =
            notification(r#"{"type":"send_notification","message":"M","extra":"x","data":[1]}"#);
        assert_eq!(payload.kind, NotificationKind::SendNotification);
        assert_eq!(payload.title, FALLBACK_TITLE);
        assert_eq!(payload.message, "M");
        assert_eq!(payload.time(), None);
    }

    #[test]
    fn non_string_top_level_falls_through_to_data() {
        let payload = notification(
            r#"{"type":"notification","title":{"text":"x"},"message":[],"data":{"title":"Inner","message":"Body"}}"#,
        );
        assert_eq!(payload.title, "Inner");
        assert_eq!(payload.message, "Body");
    }

    #[test]
    fn payload_serializes_without_empty_extra() {
        let payload = notification(r#"{"type":"notification","title":"T"}"#);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "notification");
        assert!(json.get("extra").is_none());
    }
}
