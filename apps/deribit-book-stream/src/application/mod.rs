//! Application Layer - Session service and port definitions.
//!
//! This layer contains the session driver and the port interfaces it
//! drives; adapters for those ports live in the infrastructure layer.

/// Port interfaces for the transport and frame display.
pub mod ports;

/// Application services (the session driver).
pub mod services;
