//! Push-trigger decoding.
//!
//! The trigger transport delivers a JSON envelope whose `message.data` field is
//! base64-encoded JSON describing the object that landed in the raw bucket:
//!
//! ```json
//! { "message": { "data": "eyJuYW1lIjoiY2xpcDEubXA0In0=", "messageId": "1" } }
//! ```
//!
//! Decoding is a pure function so it can be exercised without a transport.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for trigger decoding.
pub type TriggerResult<T> = Result<T, TriggerError>;

/// Reasons a trigger payload is rejected.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("Message data is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Message data is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Message data is not valid JSON: {0}")]
    InvalidMessage(#[source] serde_json::Error),

    #[error("Invalid message payload received: missing `name`")]
    MissingName,

    #[error("Object key cannot be staged safely: {0}")]
    UnsafeKey(String),
}

/// Push envelope as delivered by the trigger transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

/// The inner message of a push envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64-encoded JSON body
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, String>>,
}

impl PushEnvelope {
    /// Wrap a JSON value the way the transport would.
    pub fn wrap(payload: &Value) -> Self {
        Self {
            message: PushMessage {
                data: STANDARD.encode(payload.to_string()),
                message_id: None,
                attributes: None,
            },
            subscription: None,
        }
    }
}

/// Validated trigger: the storage key of the raw object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// Decode and validate a raw trigger body.
pub fn parse_trigger(body: &[u8]) -> TriggerResult<TriggerPayload> {
    let envelope: PushEnvelope =
        serde_json::from_slice(body).map_err(TriggerError::InvalidEnvelope)?;

    let decoded = STANDARD.decode(envelope.message.data.trim())?;
    let text = String::from_utf8(decoded)?;
    let message: Value = serde_json::from_str(&text).map_err(TriggerError::InvalidMessage)?;

    let name = message
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(TriggerError::MissingName)?;

    validate_key(name)?;

    Ok(TriggerPayload {
        name: name.to_string(),
        bucket: message
            .get("bucket")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Reject keys that cannot be joined under a staging directory safely.
///
/// Every `/`-separated segment must be a plain name. Empty, `.` and `..`
/// segments either escape the directory or let two distinct keys resolve to
/// the same local file.
fn validate_key(key: &str) -> TriggerResult<()> {
    let unsafe_key = key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|segment| matches!(segment, "" | "." | ".."));

    if unsafe_key {
        return Err(TriggerError::UnsafeKey(key.to_string()));
    }
    Ok(())
}
