//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Deribit WebSocket adapters.
pub mod deribit;

/// Command line argument parsing.
pub mod cli;

/// Configuration loading.
pub mod config;

/// Console frame display.
pub mod console;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
