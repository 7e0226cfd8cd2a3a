//! Prometheus Metrics Module
//!
//! Exposes session metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Counts and sizes of inbound frames by kind
//! - **Stages**: Lifecycle stage durations and failures
//! - **Heartbeat**: WebSocket pings sent
//!
//! # Integration
//!
//! Metrics are served at `/metrics` on `DERIBIT_METRICS_PORT` when that
//! port is non-zero. Without an installed recorder every recording call
//! is a no-op. The session reports through [`PrometheusMetrics`], its
//! implementation of the [`SessionMetrics`] port.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::application::ports::SessionMetrics;
use crate::domain::frame::FrameKind;
use crate::domain::session::Stage;

// =============================================================================
// Exporter
// =============================================================================

/// Install the Prometheus recorder and its HTTP listener.
///
/// Returns `false` without installing anything when `port` is 0. Must be
/// called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the recorder is already installed or the listener
/// cannot be built.
pub fn init_metrics(port: u16) -> Result<bool, BuildError> {
    if port == 0 {
        return Ok(false);
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;

    register_metrics();
    Ok(true)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "deribit_stream_frames_received_total",
        "Total frames received from the venue by kind"
    );
    describe_counter!(
        "deribit_stream_decode_failures_total",
        "Total frames that were not valid JSON"
    );
    describe_counter!(
        "deribit_stream_stage_failures_total",
        "Total session failures by lifecycle stage"
    );
    describe_counter!(
        "deribit_stream_heartbeat_pings_total",
        "Total WebSocket pings sent"
    );
    describe_histogram!(
        "deribit_stream_stage_duration_seconds",
        "Time spent completing each lifecycle stage"
    );
    describe_histogram!(
        "deribit_stream_frame_bytes",
        "Payload size of inbound frames"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an inbound frame.
pub fn record_frame(kind: FrameKind, bytes: usize) {
    counter!(
        "deribit_stream_frames_received_total",
        "kind" => kind.as_str()
    )
    .increment(1);

    #[allow(clippy::cast_precision_loss)]
    histogram!("deribit_stream_frame_bytes").record(bytes as f64);

    if kind == FrameKind::Undecodable {
        counter!("deribit_stream_decode_failures_total").increment(1);
    }
}

/// Record how long a lifecycle stage took to complete.
pub fn record_stage_duration(stage: Stage, duration: Duration) {
    histogram!(
        "deribit_stream_stage_duration_seconds",
        "stage" => stage.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a session failure.
pub fn record_stage_failure(stage: Stage) {
    counter!(
        "deribit_stream_stage_failures_total",
        "stage" => stage.as_str()
    )
    .increment(1);
}

/// Record a heartbeat ping.
pub fn record_heartbeat_ping() {
    counter!("deribit_stream_heartbeat_pings_total").increment(1);
}

// =============================================================================
// Session Metrics Adapter
// =============================================================================

/// Forwards session progress to the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl SessionMetrics for PrometheusMetrics {
    fn stage_completed(&mut self, stage: Stage, elapsed: Duration) {
        record_stage_duration(stage, elapsed);
    }

    fn stage_failed(&mut self, stage: Stage) {
        record_stage_failure(stage);
    }

    fn frame_received(&mut self, kind: FrameKind, bytes: usize) {
        record_frame(kind, bytes);
    }
}

// =============================================================================
// Tests
// =============================================================================
