//! JSON Codec
//!
//! Encodes outbound JSON-RPC requests and decodes inbound frames into
//! generic JSON. A frame that is not valid JSON is not an error for the
//! stream: it comes back as [`InboundFrame::Raw`] so the caller can show it
//! and keep reading.

use serde_json::Value;

use super::InboundFrame;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON codec for the Deribit WebSocket API.
///
/// Pure data transformation, shared by the session and the console.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a value to a compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode one inbound payload.
    #[must_use]
    pub fn decode(&self, payload: &[u8]) -> InboundFrame {
        match serde_json::from_slice::<Value>(payload) {
            Ok(value) => InboundFrame::Decoded(value),
            Err(e) => InboundFrame::Raw {
                bytes: payload.to_vec(),
                error: CodecError::from(e).to_string(),
            },
        }
    }

    /// Render a decoded value in indented form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn pretty(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}
