//! Deribit WebSocket Adapters
//!
//! Implements the connection to Deribit's public JSON-RPC WebSocket API:
//!
//! - **Transport**: DNS, TCP, TLS and WebSocket upgrade, one stage at a time
//! - **Heartbeat**: ping/pong liveness once the WebSocket is up
//! - **TLS**: rustls client context with the webpki root set
//!
//! Request and frame types live in the domain layer; this module only moves
//! bytes.

pub mod heartbeat;
pub mod tls;
pub mod transport;

pub use heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatEvent, HeartbeatState};
pub use tls::TlsError;
pub use transport::{FramedChannel, ProtocolSettings, WsTransport};
