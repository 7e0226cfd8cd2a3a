//! Domain Layer - Session lifecycle and subscription types.
//!
//! Pure Rust types with no I/O: the connection state machine and the
//! naming rules for order book channels.

/// Decoded-or-raw inbound frames.
pub mod frame;

/// Connection lifecycle state machine.
pub mod session;

/// Order book channel naming.
pub mod subscription;
