//! Configuration Module
//!
//! Configuration loading for the book stream, from environment variables.

mod settings;

pub use settings::{
    ChannelSettings, ConfigError, EndpointSettings, Environment, ServerSettings, StreamConfig,
    WebSocketSettings,
};
