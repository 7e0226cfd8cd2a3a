//! Heartbeat
//!
//! Guards WebSocket liveness once the handshake is done, through periodic
//! ping frames. Any inbound frame counts as proof of life. Once a ping is
//! outstanding, the connection is declared dead if nothing arrives within
//! the pong timeout of that ping, independent of the ping interval.
//!
//! The heartbeat is polled inline by the receive loop rather than run as a
//! separate task, so the connection never has more than one reader and one
//! writer.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Silence tolerated after a ping before the connection is considered dead.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }

    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &crate::WebSocketSettings) -> Self {
        Self {
            ping_interval: settings.heartbeat_interval,
            pong_timeout: settings.heartbeat_timeout,
        }
    }
}

/// What the receive loop should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a ping frame.
    SendPing,
    /// The peer has been silent too long.
    Timeout(Duration),
}

/// Liveness bookkeeping for one connection.
#[derive(Debug)]
pub struct HeartbeatState {
    last_activity: Instant,
    /// When the oldest unanswered ping went out.
    ping_sent_at: Option<Instant>,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create new heartbeat state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_activity: Instant::now(),
            ping_sent_at: None,
        }
    }

    /// Record that a frame (data, ping or pong) was received.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.ping_sent_at = None;
    }

    /// Mark that we're waiting for a pong. Later pings do not move the
    /// deadline set by the first unanswered one.
    pub fn mark_ping_sent(&mut self) {
        if self.ping_sent_at.is_none() {
            self.ping_sent_at = Some(Instant::now());
        }
    }

    /// Check if we're currently waiting for a pong.
    #[must_use]
    pub const fn is_waiting_for_pong(&self) -> bool {
        self.ping_sent_at.is_some()
    }

    /// Instant by which a pong (or any frame) must arrive, if a ping is out.
    #[must_use]
    pub fn pong_deadline(&self, pong_timeout: Duration) -> Option<Instant> {
        self.ping_sent_at.map(|sent| sent + pong_timeout)
    }

    /// Get the time since the last inbound frame.
    #[must_use]
    pub fn time_since_activity(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Ping scheduler and timeout detector.
#[derive(Debug)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    state: HeartbeatState,
    interval: Interval,
}

impl Heartbeat {
    /// Start a heartbeat. The first ping is due one interval from now.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        let mut interval =
            tokio::time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            config,
            state: HeartbeatState::new(),
            interval,
        }
    }

    /// Silence tolerated after a ping.
    #[must_use]
    pub const fn pong_timeout(&self) -> Duration {
        self.config.pong_timeout
    }

    /// Record an inbound frame.
    pub fn record_activity(&mut self) {
        self.state.record_activity();
    }

    /// Record that a ping went out.
    pub fn mark_ping_sent(&mut self) {
        self.state.mark_ping_sent();
    }

    /// Wait for the pong deadline or the next ping tick, whichever is first.
    ///
    /// Cancel safe: dropping the future before it completes loses nothing.
    pub async fn next_event(&mut self) -> HeartbeatEvent {
        let deadline = self.state.pong_deadline(self.config.pong_timeout);

        tokio::select! {
            biased;
            () = sleep_until(deadline) => {
                let elapsed = self.state.time_since_activity();
                tracing::warn!(
                    elapsed_secs = elapsed.as_secs(),
                    timeout_secs = self.config.pong_timeout.as_secs(),
                    "Heartbeat timeout detected"
                );
                HeartbeatEvent::Timeout(elapsed)
            }
            _ = self.interval.tick() => HeartbeatEvent::SendPing,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
