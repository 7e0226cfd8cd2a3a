#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Deribit Book Stream - Order Book Subscriber
//!
//! Connects to Deribit's public WebSocket API over TLS, subscribes to one
//! instrument's order book channel and prints every message it receives.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Lifecycle and naming rules, no I/O
//!   - `session`: Connection state machine and stage failures
//!   - `subscription`: Order book channel names
//!   - `frame`: Decoded-or-raw inbound frames
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport and frame sink interfaces
//!   - `services`: The session driver
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `deribit`: TLS WebSocket transport, heartbeat, JSON-RPC messages
//!   - `console`: Stdout/stderr frame display
//!   - `config`: Environment configuration
//!   - `cli`: Argument parsing
//!   - `metrics`, `telemetry`: Prometheus and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//! resolve ─► connect ─► TLS ─► WebSocket upgrade ─► subscribe
//!                                                      │
//!                          ┌───────────────────────────┘
//!                          ▼
//!                   receive ─► decode ─► display ─┐
//!                      ▲                          │
//!                      └──────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Lifecycle types with no external I/O.
pub mod domain;

/// Application layer - Session driver and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::frame::{CodecError, FrameKind, InboundFrame, JsonCodec};
pub use domain::session::{Failure, SessionEvent, SessionState, Stage, TransitionError};
pub use domain::subscription::{BookChannel, Instrument, SUBSCRIBE_REQUEST_ID, SubscribeRequest};

// Application
pub use application::ports::{FrameSink, NoMetrics, SessionMetrics, Transport, TransportError};
pub use application::services::{Session, SessionConfig};

// Infrastructure config
pub use infrastructure::config::{
    ChannelSettings, ConfigError, EndpointSettings, Environment, ServerSettings, StreamConfig,
    WebSocketSettings,
};

// Adapters
pub use infrastructure::console::ConsoleSink;
pub use infrastructure::deribit::{FramedChannel, HeartbeatConfig, ProtocolSettings, WsTransport};

// CLI
pub use infrastructure::cli::{USAGE, UsageError, parse_args};

// Metrics
pub use infrastructure::metrics::{PrometheusMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
