//! Deribit Book Stream Binary
//!
//! Subscribes to one instrument's order book and prints every message.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin deribit-book-stream -- BTC-PERPETUAL
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `DERIBIT_ENV`: prod | test (default: prod)
//! - `DERIBIT_HOST`: Host override (default: by environment)
//! - `DERIBIT_PORT`: Port (default: 443)
//! - `DERIBIT_WS_PATH`: WebSocket path (default: /ws/api/v2)
//! - `DERIBIT_BOOK_INTERVAL`: Channel cadence - "raw" | "100ms" | "agg2" (default: 100ms)
//! - `DERIBIT_BOOK_GROUP` / `DERIBIT_BOOK_DEPTH`: Grouped book channel (default: unset)
//! - `DERIBIT_CONNECT_TIMEOUT_SECS`: Resolve/connect/TLS timeout (default: 30)
//! - `DERIBIT_HANDSHAKE_TIMEOUT_SECS`: WebSocket handshake timeout (default: 30)
//! - `DERIBIT_HEARTBEAT_INTERVAL_SECS`: Ping interval (default: 30)
//! - `DERIBIT_HEARTBEAT_TIMEOUT_SECS`: Pong timeout (default: 60)
//! - `DERIBIT_MAX_FRAME_BYTES`: Largest inbound message (default: 16777216)
//! - `DERIBIT_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: deribit-book-stream)
//! - `RUST_LOG`: Log filter (default: `deribit_book_stream=info`)

use std::process::ExitCode;

use anyhow::Context;
use deribit_book_stream::infrastructure::deribit::tls;
use deribit_book_stream::infrastructure::telemetry;
use deribit_book_stream::{
    ConsoleSink, Instrument, PrometheusMetrics, ProtocolSettings, Session, StreamConfig, USAGE,
    WsTransport, init_metrics, parse_args,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let instrument = match parse_args(std::env::args_os().skip(1)) {
        Ok(instrument) => instrument,
        Err(_) => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    load_dotenv();

    match run(instrument).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(instrument: Instrument) -> anyhow::Result<ExitCode> {
    // Initialize telemetry (tracing + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!(%instrument, "Starting Deribit book stream");

    let config = StreamConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if init_metrics(config.server.metrics_port).context("failed to start metrics exporter")? {
        tracing::info!(port = config.server.metrics_port, "Metrics exporter listening");
    }

    let connector = tls::connector().context("failed to build TLS context")?;
    let transport = WsTransport::new(
        connector,
        ProtocolSettings::from_websocket_settings(&config.websocket),
    );
    let mut session = Session::new(
        config.session_config(instrument),
        transport,
        ConsoleSink::stdio(),
    )
    .with_metrics(Box::new(PrometheusMetrics));

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    tokio::select! {
        failure = session.run() => {
            eprintln!("{failure}");
            tracing::error!(stage = %failure.stage, "Session terminated");
            Ok(ExitCode::FAILURE)
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Book stream stopped");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load .env from the current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        url = %config.ws_url(),
        channel = %config.channel.book_channel(),
        metrics_port = config.server.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        connect_timeout_secs = config.websocket.connect_timeout.as_secs(),
        handshake_timeout_secs = config.websocket.handshake_timeout.as_secs(),
        heartbeat_interval_secs = config.websocket.heartbeat_interval.as_secs(),
        heartbeat_timeout_secs = config.websocket.heartbeat_timeout.as_secs(),
        max_message_size = config.websocket.max_message_size,
        "WebSocket settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel `shutdown_token`.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
