//! # Message Envelope
//!
//! The unit of wire exchange between relay and client, serialized as one JSON
//! object per text frame:
//!
//! ```text
//! { "type": "<TAG>", "correlationId"?: string, "completed"?: bool,
//!   "address"?: string, "refetch"?: bool, "data": <payload> }
//! ```
//!
//! ## Decoding
//!
//! Decoding is two-stage. A frame that is not a JSON object or lacks a string
//! `type` is malformed and yields [`CodecError`]. A frame whose `type` is a
//! string outside the closed tag set decodes to [`Inbound::Unknown`]. Callers
//! drop both; neither is answered.

use crate::correlation::CorrelationKey;
use crate::dispatch::DispatchType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Envelope codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame is JSON but not a well-formed envelope.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame is not valid JSON, or a payload does not fit its type.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    // =========================================================================
    // HEADER
    // =========================================================================
    #[serde(rename = "type")]
    pub kind: DispatchType,

    /// Present on request/response pairs, absent on broadcast pushes.
    #[serde(rename = "correlationId", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationKey>,

    /// Streaming responses only. Exactly one message per stream is `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,

    /// Echo of the queried address on PnL responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Tracked-wallets responses: `true` when answering a refetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetch: Option<bool>,

    // =========================================================================
    // PAYLOAD
    // =========================================================================
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: DispatchType, data: Value) -> Self {
        Self {
            kind,
            correlation_id: None,
            completed: None,
            address: None,
            refetch: None,
            data,
        }
    }

    /// Build an envelope from any serializable payload.
    pub fn with_payload<T: Serialize>(kind: DispatchType, payload: &T) -> Result<Self, CodecError> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    pub fn correlated(mut self, key: CorrelationKey) -> Self {
        self.correlation_id = Some(key);
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_refetch(mut self, refetch: bool) -> Self {
        self.refetch = Some(refetch);
        self
    }

    /// Whether this is the terminal message of a stream.
    pub fn is_completed(&self) -> bool {
        self.completed == Some(true)
    }

    /// Decode `data` into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Whether `data` carries a non-null `error` field.
    pub fn error_message(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Known(Envelope),
    /// Well-formed frame with a tag outside the closed set.
    Unknown(String),
}

/// Serialize an envelope to its wire text.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode one wire frame.
pub fn decode(frame: &str) -> Result<Inbound, CodecError> {
    let value: Value = serde_json::from_str(frame)?;

    let object = value
        .as_object()
        .ok_or_else(|| CodecError::Malformed("frame is not a JSON object".to_string()))?;

    let tag = match object.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        Some(_) => return Err(CodecError::Malformed("`type` is not a string".to_string())),
        None => return Err(CodecError::Malformed("missing `type`".to_string())),
    };

    if tag.parse::<DispatchType>().is_err() {
        return Ok(Inbound::Unknown(tag));
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| CodecError::Malformed(e.to_string()))?;

    Ok(Inbound::Known(envelope))
}
