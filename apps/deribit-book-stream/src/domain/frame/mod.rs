//! Inbound Frame Types
//!
//! The inbound schema is venue defined, so frames are kept as a generic
//! JSON value when they decode and as raw bytes when they do not.

use serde_json::Value;

mod codec;

pub use codec::{CodecError, JsonCodec};

/// One inbound frame after a decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Payload decoded as JSON.
    Decoded(Value),
    /// Payload that failed to decode, kept verbatim.
    Raw {
        /// Received bytes.
        bytes: Vec<u8>,
        /// Decoder diagnostic.
        error: String,
    },
}

impl InboundFrame {
    /// Check if the payload decoded.
    #[must_use]
    pub const fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }

    /// Classify the frame for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Decoded(value) => FrameKind::classify(value),
            Self::Raw { .. } => FrameKind::Undecodable,
        }
    }
}

/// Coarse JSON-RPC shape of an inbound frame.
///
/// Display treats every frame the same; the kind only labels telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Response carrying a `result`.
    Response,
    /// Response carrying an `error`.
    ErrorResponse,
    /// `subscription` notification with channel data.
    Notification,
    /// Valid JSON of any other shape.
    Other,
    /// Not valid JSON.
    Undecodable,
}

impl FrameKind {
    fn classify(value: &Value) -> Self {
        if value.get("error").is_some() {
            Self::ErrorResponse
        } else if value.get("result").is_some() {
            Self::Response
        } else if value.get("method").and_then(Value::as_str) == Some("subscription") {
            Self::Notification
        } else {
            Self::Other
        }
    }

    /// Label used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::ErrorResponse => "error_response",
            Self::Notification => "notification",
            Self::Other => "other",
            Self::Undecodable => "undecodable",
        }
    }
}
