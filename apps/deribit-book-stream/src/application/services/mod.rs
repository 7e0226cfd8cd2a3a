//! Application Services
//!
//! - `session`: drives one connection through its lifecycle

pub mod session;

pub use session::{Session, SessionConfig};
