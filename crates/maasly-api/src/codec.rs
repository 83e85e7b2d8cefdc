//! Frame codec for the server's WebSocket protocol.
//!
//! Outgoing requests are JSON text frames:
//!
//! ```json
//! { "request_id": 0, "type": "zone/fetch",
//!   "meta": { "model": "zone", "method": "list" },
//!   "payload": { "params": null } }
//! ```
//!
//! Inbound frames are either a *response* correlated by `request_id`
//! (`{"request_id", "type": "SUCCESS" | "ERROR", "result"}`) or an
//! uncorrelated *notification* (`{"name": "zone.created", "data"}`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::registry::RequestId;

// ── Outgoing ─────────────────────────────────────────────────────────

/// Routing metadata: which model and which server-side method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub model: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FramePayload {
    /// Method parameters; serialized as `null` when absent.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A request frame as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub request_id: RequestId,
    /// Action type string, e.g. `"zone/fetch"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub meta: FrameMeta,
    #[serde(default)]
    pub payload: FramePayload,
}

impl RequestFrame {
    pub fn new(
        request_id: RequestId,
        kind: impl Into<String>,
        model: impl Into<String>,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        Self {
            request_id,
            kind: kind.into(),
            meta: FrameMeta {
                model: model.into(),
                method: method.into(),
            },
            payload: FramePayload { params },
        }
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Encode)
    }

    /// Parse a request frame back from its text form.
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::MalformedFrame {
            message: e.to_string(),
            frame: text.to_owned(),
        })
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Outcome reported by a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Error,
}

/// A response correlated to one pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: RequestId,
    pub status: ResponseStatus,
    /// `result` on success; the error payload on failure.
    pub body: Value,
}

/// Server-side mutation kinds carried by notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyVerb {
    Create,
    Update,
    Delete,
}

impl NotifyVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for NotifyVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyVerb {
    type Err = ();

    /// Accepts both the bare and past-tense spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" | "created" => Ok(Self::Create),
            "update" | "updated" => Ok(Self::Update),
            "delete" | "deleted" => Ok(Self::Delete),
            _ => Err(()),
        }
    }
}

/// An unsolicited push describing a mutation made by any client.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub model: String,
    pub verb: NotifyVerb,
    /// Full entity, or the bare primary key for some delete notifications.
    pub data: Value,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response(Response),
    Notification(Notification),
}

/// Every field either frame kind may carry.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    request_id: Option<RequestId>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Parse one inbound text frame.
///
/// A frame with a `request_id` is a response; anything else must be a
/// notification named `"<model>.<verb>"`.
pub fn decode(text: &str) -> Result<InboundFrame, Error> {
    let malformed = |message: String| Error::MalformedFrame {
        message,
        frame: text.to_owned(),
    };

    let raw: RawFrame = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;

    if let Some(request_id) = raw.request_id {
        let status = match raw.kind.as_deref() {
            Some("SUCCESS") => ResponseStatus::Success,
            Some("ERROR") => ResponseStatus::Error,
            Some(other) => return Err(malformed(format!("unknown response type '{other}'"))),
            None => return Err(malformed("response without a type".into())),
        };

        let body = match status {
            ResponseStatus::Success => raw.result,
            ResponseStatus::Error => raw.error.or(raw.result),
        }
        .unwrap_or(Value::Null);

        return Ok(InboundFrame::Response(Response {
            request_id,
            status,
            body,
        }));
    }

    let name = raw
        .name
        .ok_or_else(|| malformed("frame has neither request_id nor name".into()))?;
    let (model, verb) = split_notification_name(&name)?;

    Ok(InboundFrame::Notification(Notification {
        model: model.to_owned(),
        verb,
        data: raw.data.unwrap_or(Value::Null),
    }))
}

/// Split `"machine.updated"` into `("machine", Update)`.
pub fn split_notification_name(name: &str) -> Result<(&str, NotifyVerb), Error> {
    let unknown = || Error::UnknownNotification { name: name.into() };

    let (model, verb) = name.rsplit_once('.').ok_or_else(unknown)?;
    if model.is_empty() {
        return Err(unknown());
    }
    let verb = verb.parse::<NotifyVerb>().map_err(|()| unknown())?;
    Ok((model, verb))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_wire_shape() {
        let frame = RequestFrame::new(0, "zone/fetch", "zone", "list", None);
        insta::assert_json_snapshot!(frame, @r#"
        {
          "request_id": 0,
          "type": "zone/fetch",
          "meta": {
            "model": "zone",
            "method": "list"
          },
          "payload": {
            "params": null
          }
        }
        "#);
    }

    #[test]
    fn request_frame_round_trip() {
        let frame = RequestFrame::new(
            7,
            "tag/update",
            "tag",
            "update",
            Some(json!({"id": 5, "name": "gpu", "comment": "nvidia"})),
        );
        let text = frame.encode().unwrap();
        let parsed = RequestFrame::parse(&text).unwrap();

        assert_eq!(parsed, frame);
        assert_eq!(parsed.meta.model, "tag");
        assert_eq!(parsed.meta.method, "update");
        assert_eq!(parsed.payload.params.unwrap()["name"], "gpu");
    }

    #[test]
    fn decode_success_response() {
        let text = r#"{"request_id": 0, "type": "SUCCESS", "result": [{"id": 1, "name": "default"}]}"#;
        let frame = decode(text).unwrap();

        assert_eq!(
            frame,
            InboundFrame::Response(Response {
                request_id: 0,
                status: ResponseStatus::Success,
                body: json!([{"id": 1, "name": "default"}]),
            })
        );
    }

    #[test]
    fn decode_error_response_reads_result() {
        let text = r#"{"request_id": 3, "type": "ERROR", "result": {"name": ["already exists"]}}"#;
        let InboundFrame::Response(resp) = decode(text).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.body, json!({"name": ["already exists"]}));
    }

    #[test]
    fn decode_error_response_prefers_error_field() {
        let text = r#"{"request_id": 4, "type": "ERROR", "error": "Permission denied"}"#;
        let InboundFrame::Response(resp) = decode(text).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(resp.body, json!("Permission denied"));
    }

    #[test]
    fn decode_success_without_result_is_null() {
        let InboundFrame::Response(resp) = decode(r#"{"request_id": 1, "type": "SUCCESS"}"#).unwrap()
        else {
            panic!("expected a response");
        };
        assert_eq!(resp.body, Value::Null);
    }

    #[test]
    fn decode_notification_past_tense() {
        let text = r#"{"name": "fabric.created", "data": {"id": 10, "name": "fabric-10"}}"#;
        let frame = decode(text).unwrap();

        assert_eq!(
            frame,
            InboundFrame::Notification(Notification {
                model: "fabric".into(),
                verb: NotifyVerb::Create,
                data: json!({"id": 10, "name": "fabric-10"}),
            })
        );
    }

    #[test]
    fn decode_notification_bare_verb_and_key() {
        let InboundFrame::Notification(n) =
            decode(r#"{"name": "machine.delete", "data": "abc123"}"#).unwrap()
        else {
            panic!("expected a notification");
        };
        assert_eq!(n.model, "machine");
        assert_eq!(n.verb, NotifyVerb::Delete);
        assert_eq!(n.data, json!("abc123"));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode("not json at all").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn decode_rejects_unknown_response_type() {
        let err = decode(r#"{"request_id": 1, "type": "MAYBE"}"#).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn decode_rejects_frame_without_routing() {
        let err = decode(r#"{"data": {"id": 1}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn decode_rejects_unknown_verb() {
        let err = decode(r#"{"name": "zone.exploded", "data": {}}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownNotification { .. }));
    }

    #[test]
    fn split_name_needs_model() {
        assert!(split_notification_name(".created").is_err());
        assert!(split_notification_name("created").is_err());
        assert_eq!(
            split_notification_name("resourcepool.updated").unwrap(),
            ("resourcepool", NotifyVerb::Update)
        );
    }
}
