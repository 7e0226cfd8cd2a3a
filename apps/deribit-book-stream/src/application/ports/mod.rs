//! Port Interfaces
//!
//! Defines the interfaces (ports) the session drives, following the
//! Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: resolver, secure byte stream and WebSocket framing for
//!   one connection, one stage per method
//! - `FrameSink`: where inbound frames are displayed
//! - `SessionMetrics`: stage timings, stage failures and frame counts

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::frame::{FrameKind, InboundFrame};
use crate::domain::session::Stage;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors surfaced by a [`Transport`] stage.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket level I/O failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Resolution succeeded but returned no addresses.
    #[error("no endpoints found for {0}")]
    NoEndpoints(String),

    /// Hostname is not usable as a TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// The transport-level connect timeout elapsed.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// WebSocket protocol failure (handshake rejected, bad frame, ...).
    #[error("websocket: {0}")]
    Protocol(String),

    /// The WebSocket handshake did not finish within its timeout.
    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimedOut(Duration),

    /// No pong or frame arrived within the heartbeat timeout.
    #[error("heartbeat timeout: peer silent for {0:?}")]
    LivenessTimeout(Duration),

    /// Peer closed the connection or the stream ended.
    #[error("connection closed: {0}")]
    Closed(String),

    /// A stage was invoked before the one it depends on.
    #[error("{0} requested before its prerequisite stage")]
    NotReady(&'static str),
}

// =============================================================================
// Transport Port
// =============================================================================

/// One connection to one remote endpoint, advanced stage by stage.
///
/// Implementations hold whatever the previous stage established (socket,
/// TLS stream, WebSocket) and must return [`TransportError::NotReady`] when
/// a stage is called out of order. Only one operation is ever in flight.
#[async_trait]
pub trait Transport: Send {
    /// Resolve `host:port` to candidate endpoints.
    async fn resolve(&mut self, host: &str, port: &str) -> Result<Vec<SocketAddr>, TransportError>;

    /// Connect to the first reachable endpoint, returning it.
    async fn connect(&mut self, endpoints: &[SocketAddr]) -> Result<SocketAddr, TransportError>;

    /// Run the TLS handshake, verifying the peer as `host`.
    async fn secure_handshake(&mut self, host: &str) -> Result<(), TransportError>;

    /// Upgrade to WebSocket. `host` is the Host header value.
    async fn protocol_handshake(&mut self, host: &str, path: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next data frame and append its payload to `buffer`.
    ///
    /// Returns the number of bytes appended. Control frames are handled
    /// internally and never surface here.
    async fn receive(&mut self, buffer: &mut Vec<u8>) -> Result<usize, TransportError>;
}

// =============================================================================
// Frame Sink Port
// =============================================================================

/// Destination for inbound frames.
pub trait FrameSink: Send {
    /// Display one frame, decoded or raw.
    fn display(&mut self, frame: &InboundFrame);
}

// =============================================================================
// Session Metrics Port
// =============================================================================

/// Observer for session progress. Every method defaults to a no-op.
pub trait SessionMetrics: Send {
    /// A setup stage finished after `elapsed`.
    fn stage_completed(&mut self, _stage: Stage, _elapsed: Duration) {}

    /// A stage failed and the session terminated.
    fn stage_failed(&mut self, _stage: Stage) {}

    /// One inbound frame of `bytes` bytes was consumed.
    fn frame_received(&mut self, _kind: FrameKind, _bytes: usize) {}
}

/// Metrics observer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetrics;

impl SessionMetrics for NoMetrics {}
