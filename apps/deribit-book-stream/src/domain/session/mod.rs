//! Session Lifecycle State Machine
//!
//! A session walks one connection through a fixed, linear sequence of
//! stages:
//!
//! ```text
//! Init → Resolving → Connecting → SecuringTransport → NegotiatingProtocol
//!      → Subscribing → Streaming ⟲ → Terminated (failure only)
//! ```
//!
//! Each stage depends on what the previous one established, so the
//! transition table refuses any event that arrives out of order. There is
//! no success-terminal state: a healthy session stays in `Streaming`.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Stage
// =============================================================================

/// The operation a session performs while in a given state.
///
/// Used to label diagnostics, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Hostname to endpoint resolution.
    Resolve,
    /// TCP connection to one of the resolved endpoints.
    Connect,
    /// TLS handshake.
    SecureHandshake,
    /// WebSocket upgrade.
    ProtocolHandshake,
    /// Sending the subscribe request.
    Send,
    /// Waiting for the next inbound frame.
    Receive,
}

impl Stage {
    /// All stages in lifecycle order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Resolve,
            Self::Connect,
            Self::SecureHandshake,
            Self::ProtocolHandshake,
            Self::Send,
            Self::Receive,
        ]
    }

    /// Diagnostic name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Connect => "connect",
            Self::SecureHandshake => "secure_handshake",
            Self::ProtocolHandshake => "protocol_handshake",
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }

    /// Whether the transport-level connect timeout bounds this stage.
    ///
    /// Once the secure handshake completes, liveness belongs to the
    /// WebSocket layer (handshake timeout, then heartbeat).
    #[must_use]
    pub const fn uses_connect_timeout(self) -> bool {
        matches!(self, Self::Resolve | Self::Connect | Self::SecureHandshake)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Failure
// =============================================================================

/// Why a session stopped: the stage that failed and a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Stage that was in progress.
    pub stage: Stage,
    /// Human readable diagnostic.
    pub message: String,
}

impl Failure {
    /// Create a new failure record.
    #[must_use]
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Inputs to the state machine, one per collaborator completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was started.
    Start,
    /// Name resolution produced at least one endpoint.
    Resolved,
    /// A TCP connection was established.
    Connected,
    /// The TLS handshake completed.
    Secured,
    /// The WebSocket handshake completed.
    Negotiated,
    /// The subscribe request was written.
    SubscribeSent,
    /// A complete inbound frame was consumed.
    FrameReceived,
    /// The stage in progress failed.
    Failed(String),
}

impl SessionEvent {
    const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Resolved => "resolved",
            Self::Connected => "connected",
            Self::Secured => "secured",
            Self::Negotiated => "negotiated",
            Self::SubscribeSent => "subscribe_sent",
            Self::FrameReceived => "frame_received",
            Self::Failed(_) => "failed",
        }
    }
}

/// An event arrived that the current state does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event} while {state}")]
pub struct TransitionError {
    /// Name of the state the session was in.
    pub state: &'static str,
    /// Name of the rejected event.
    pub event: &'static str,
}

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, nothing issued yet.
    #[default]
    Init,
    /// Resolving the target host.
    Resolving,
    /// Connecting to a resolved endpoint.
    Connecting,
    /// Performing the TLS handshake.
    SecuringTransport,
    /// Performing the WebSocket handshake.
    NegotiatingProtocol,
    /// Sending the subscribe request.
    Subscribing,
    /// Receiving frames; stays here for the rest of a healthy session.
    Streaming,
    /// Stopped after an unrecoverable failure.
    Terminated(Failure),
}

impl SessionState {
    /// Name of the state, for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::SecuringTransport => "securing_transport",
            Self::NegotiatingProtocol => "negotiating_protocol",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Terminated(_) => "terminated",
        }
    }

    /// The operation in progress in this state, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Init | Self::Terminated(_) => None,
            Self::Resolving => Some(Stage::Resolve),
            Self::Connecting => Some(Stage::Connect),
            Self::SecuringTransport => Some(Stage::SecureHandshake),
            Self::NegotiatingProtocol => Some(Stage::ProtocolHandshake),
            Self::Subscribing => Some(Stage::Send),
            Self::Streaming => Some(Stage::Receive),
        }
    }

    /// Check if the session has stopped.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    /// Check if the session reached steady state.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// The failure that terminated the session, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Terminated(failure) => Some(failure),
            _ => None,
        }
    }

    /// Apply an event and return the next state.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the event is not valid for the
    /// current state. The state itself is left to the caller; a rejected
    /// event never advances the lifecycle.
    pub fn on(&self, event: SessionEvent) -> Result<Self, TransitionError> {
        let next = match (self, event) {
            (Self::Init, SessionEvent::Start) => Self::Resolving,
            (Self::Resolving, SessionEvent::Resolved) => Self::Connecting,
            (Self::Connecting, SessionEvent::Connected) => Self::SecuringTransport,
            (Self::SecuringTransport, SessionEvent::Secured) => Self::NegotiatingProtocol,
            (Self::NegotiatingProtocol, SessionEvent::Negotiated) => Self::Subscribing,
            (Self::Subscribing, SessionEvent::SubscribeSent)
            | (Self::Streaming, SessionEvent::FrameReceived) => Self::Streaming,
            (state, SessionEvent::Failed(message)) => match state.stage() {
                Some(stage) => Self::Terminated(Failure::new(stage, message)),
                None => {
                    return Err(TransitionError {
                        state: state.name(),
                        event: "failed",
                    });
                }
            },
            (state, event) => {
                return Err(TransitionError {
                    state: state.name(),
                    event: event.name(),
                });
            }
        };

        Ok(next)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated(failure) => write!(f, "terminated ({failure})"),
            other => f.write_str(other.name()),
        }
    }
}
