//! JSON-RPC Subscribe Request
//!
//! Outbound request envelope for the Deribit v2 WebSocket API.
//!
//! # Subscribe Request
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"public/subscribe",
//!  "params":{"channels":["book.BTC-PERPETUAL.100ms"]}}
//! ```
//!
//! Inbound messages are not modelled; they are displayed as generic JSON.

use serde::Serialize;

use super::BookChannel;

/// JSON-RPC protocol version tag.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method name for public channel subscriptions.
pub const SUBSCRIBE_METHOD: &str = "public/subscribe";

/// Correlation id used for the one subscribe request a session sends.
pub const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonRpcRequest<T> {
    /// Protocol version (always "2.0").
    pub jsonrpc: &'static str,
    /// Correlation id.
    pub id: u64,
    /// Method name.
    pub method: &'static str,
    /// Method parameters.
    pub params: T,
}

impl<T> JsonRpcRequest<T> {
    /// Create a new request.
    #[must_use]
    pub const fn new(id: u64, method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Parameters of `public/subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeParams {
    /// Channel names to subscribe to.
    pub channels: Vec<String>,
}

/// A `public/subscribe` request.
pub type SubscribeRequest = JsonRpcRequest<SubscribeParams>;

impl SubscribeRequest {
    /// Build the subscribe request for one instrument's book channel.
    #[must_use]
    pub fn book(id: u64, channel: &BookChannel, instrument: &str) -> Self {
        Self::new(
            id,
            SUBSCRIBE_METHOD,
            SubscribeParams {
                channels: vec![channel.channel_for(instrument)],
            },
        )
    }
}
