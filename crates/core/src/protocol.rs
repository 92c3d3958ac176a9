//! Height messages posted by the embedded iframe.
//!
//! The iframe reports its content height with
//! `{ "type": "ciu_embed", "payload": { "feature", "meta", "height" } }`,
//! either as a structured value or as a JSON string. The window-level message
//! channel also carries traffic from unrelated sources, so rejection is the
//! common case and never an error for the page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag carried in the `type` field of every height message.
pub const MESSAGE_TYPE: &str = "ciu_embed";

/// A validated height report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightUpdate {
    pub feature: String,
    pub meta: String,
    pub height: f64,
}

impl HeightUpdate {
    /// Wrap as the wire envelope the iframe posts.
    pub fn to_message(&self) -> Value {
        serde_json::json!({
            "type": MESSAGE_TYPE,
            "payload": self,
        })
    }
}

/// Why a message was not accepted as a height update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A string frame that is not JSON.
    NotJson(String),
    /// Valid JSON whose `type` is not [`MESSAGE_TYPE`].
    ForeignType,
    /// Right tag, but the payload lacks a string `feature`/`meta` or a numeric `height`.
    BadPayload(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::NotJson(e) => write!(f, "Malformed message: {}", e),
            ProtocolError::ForeignType => write!(f, "Malformed message: not a {} message", MESSAGE_TYPE),
            ProtocolError::BadPayload(e) => write!(f, "Malformed message: bad payload: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Decode a raw message. Total: anything that is not a well-formed height
/// update yields `None`.
pub fn decode(raw: &Value) -> Option<HeightUpdate> {
    classify(raw).ok()
}

/// Decode a text frame.
pub fn decode_str(raw: &str) -> Option<HeightUpdate> {
    decode(&Value::String(raw.to_string()))
}

/// Like [`decode`], but keeps the rejection reason.
pub fn classify(raw: &Value) -> Result<HeightUpdate, ProtocolError> {
    let parsed;
    let value = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|e| ProtocolError::NotJson(e.to_string()))?;
            &parsed
        }
        other => other,
    };

    if value.get("type").and_then(Value::as_str) != Some(MESSAGE_TYPE) {
        return Err(ProtocolError::ForeignType);
    }

    let payload = value
        .get("payload")
        .and_then(Value::as_object)
        .ok_or_else(|| ProtocolError::BadPayload("missing payload object".to_string()))?;

    let field = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProtocolError::BadPayload(format!("`{}` is not a string", name)))
    };
    let feature = field("feature")?;
    let meta = field("meta")?;

    let height = payload
        .get("height")
        .and_then(Value::as_f64)
        .ok_or_else(|| ProtocolError::BadPayload("`height` is not a number".to_string()))?;

    Ok(HeightUpdate {
        feature,
        meta,
        height,
    })
}
