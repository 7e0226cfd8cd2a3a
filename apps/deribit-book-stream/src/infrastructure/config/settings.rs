//! Stream Configuration Settings
//!
//! Configuration types for the book stream, loaded from environment
//! variables. Every value has a default matching Deribit's public
//! production endpoint, so an empty environment is a valid configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::application::services::SessionConfig;
use crate::domain::subscription::{BookChannel, DEFAULT_INTERVAL, Instrument};

/// Deribit environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production (`www.deribit.com`).
    #[default]
    Production,
    /// Testnet (`test.deribit.com`).
    Testnet,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "test" | "testnet" => Self::Testnet,
            _ => Self::Production,
        }
    }

    /// Check if this is the testnet.
    #[must_use]
    pub const fn is_testnet(&self) -> bool {
        matches!(self, Self::Testnet)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "prod",
            Self::Testnet => "test",
        }
    }

    /// Default API host for this environment.
    #[must_use]
    pub const fn default_host(&self) -> &'static str {
        match self {
            Self::Production => "www.deribit.com",
            Self::Testnet => "test.deribit.com",
        }
    }
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    /// API host name.
    pub host: String,
    /// Port, kept as text the way it is passed to the resolver.
    pub port: String,
    /// WebSocket resource path.
    pub path: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            host: Environment::default().default_host().to_string(),
            port: "443".to_string(),
            path: "/ws/api/v2".to_string(),
        }
    }
}

/// Order book channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Update cadence suffix.
    pub interval: String,
    /// Price grouping, paired with `depth`.
    pub group: Option<String>,
    /// Number of levels, paired with `group`.
    pub depth: Option<u32>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL.to_string(),
            group: None,
            depth: None,
        }
    }
}

impl ChannelSettings {
    /// The book channel these settings describe.
    #[must_use]
    pub fn book_channel(&self) -> BookChannel {
        let channel = BookChannel::new(self.interval.clone());
        match (&self.group, self.depth) {
            (Some(group), Some(depth)) => channel.with_grouping(group.clone(), depth),
            _ => channel,
        }
    }
}

/// Connection timing and framing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// Limit on each of resolve, connect and TLS handshake.
    pub connect_timeout: Duration,
    /// Limit on the WebSocket upgrade.
    pub handshake_timeout: Duration,
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Heartbeat timeout before considering connection dead.
    pub heartbeat_timeout: Duration,
    /// Largest inbound message accepted.
    pub max_message_size: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(60),
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

/// Complete stream configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfig {
    /// Deribit environment.
    pub environment: Environment,
    /// Endpoint settings.
    pub endpoint: EndpointSettings,
    /// Book channel settings.
    pub channel: ChannelSettings,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty, a timeout is zero, or only
    /// one of group and depth is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("DERIBIT_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let defaults = EndpointSettings::default();
        let host = lookup("DERIBIT_HOST").unwrap_or_else(|| environment.default_host().to_string());
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyValue("DERIBIT_HOST".to_string()));
        }
        let endpoint = EndpointSettings {
            host,
            port: parse_or(&lookup, "DERIBIT_PORT", 443_u16).to_string(),
            path: lookup("DERIBIT_WS_PATH")
                .filter(|p| p.starts_with('/'))
                .unwrap_or(defaults.path),
        };

        let channel = ChannelSettings {
            interval: lookup("DERIBIT_BOOK_INTERVAL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
            group: lookup("DERIBIT_BOOK_GROUP").filter(|s| !s.is_empty()),
            depth: lookup("DERIBIT_BOOK_DEPTH").and_then(|v| v.parse().ok()),
        };
        match (&channel.group, channel.depth) {
            (Some(_), None) => {
                return Err(ConfigError::InvalidValue {
                    key: "DERIBIT_BOOK_DEPTH".to_string(),
                    reason: "required when DERIBIT_BOOK_GROUP is set".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::InvalidValue {
                    key: "DERIBIT_BOOK_GROUP".to_string(),
                    reason: "required when DERIBIT_BOOK_DEPTH is set".to_string(),
                });
            }
            _ => {}
        }

        let ws_defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            connect_timeout: parse_timeout(
                &lookup,
                "DERIBIT_CONNECT_TIMEOUT_SECS",
                ws_defaults.connect_timeout,
            )?,
            handshake_timeout: parse_timeout(
                &lookup,
                "DERIBIT_HANDSHAKE_TIMEOUT_SECS",
                ws_defaults.handshake_timeout,
            )?,
            heartbeat_interval: parse_timeout(
                &lookup,
                "DERIBIT_HEARTBEAT_INTERVAL_SECS",
                ws_defaults.heartbeat_interval,
            )?,
            heartbeat_timeout: parse_timeout(
                &lookup,
                "DERIBIT_HEARTBEAT_TIMEOUT_SECS",
                ws_defaults.heartbeat_timeout,
            )?,
            max_message_size: parse_or(
                &lookup,
                "DERIBIT_MAX_FRAME_BYTES",
                ws_defaults.max_message_size,
            ),
        };

        let server = ServerSettings {
            metrics_port: parse_or(
                &lookup,
                "DERIBIT_METRICS_PORT",
                ServerSettings::default().metrics_port,
            ),
        };

        Ok(Self {
            environment,
            endpoint,
            channel,
            websocket,
            server,
        })
    }

    /// Get the WebSocket URL.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!(
            "wss://{}:{}{}",
            self.endpoint.host, self.endpoint.port, self.endpoint.path
        )
    }

    /// Session configuration for one instrument.
    #[must_use]
    pub fn session_config(&self, instrument: impl Into<Instrument>) -> SessionConfig {
        SessionConfig::new(
            self.endpoint.host.clone(),
            self.endpoint.port.clone(),
            self.endpoint.path.clone(),
            instrument,
        )
        .with_channel(self.channel.book_channel())
        .with_connect_timeout(self.websocket.connect_timeout)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("environment variable {key} is invalid: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_timeout<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let timeout = lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs);

    if timeout.is_zero() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(timeout)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<StreamConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StreamConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(
            Environment::from_str_case_insensitive("test"),
            Environment::Testnet
        );
        assert_eq!(
            Environment::from_str_case_insensitive("TESTNET"),
            Environment::Testnet
        );
        assert_eq!(
            Environment::from_str_case_insensitive("prod"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_case_insensitive("unknown"),
            Environment::Production
        );
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.ws_url(), "wss://www.deribit.com:443/ws/api/v2");
        assert_eq!(config.server.metrics_port, 0);
    }

    #[test]
    fn testnet_switches_host() {
        let config = config_from(&[("DERIBIT_ENV", "test")]).unwrap();
        assert!(config.environment.is_testnet());
        assert_eq!(config.endpoint.host, "test.deribit.com");
    }

    #[test]
    fn host_override_wins() {
        let config = config_from(&[("DERIBIT_ENV", "test"), ("DERIBIT_HOST", "localhost")]).unwrap();
        assert_eq!(config.endpoint.host, "localhost");
    }

    #[test]
    fn empty_host_rejected() {
        let err = config_from(&[("DERIBIT_HOST", " ")]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(key) if key == "DERIBIT_HOST"));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config_from(&[
            ("DERIBIT_PORT", "https"),
            ("DERIBIT_HEARTBEAT_INTERVAL_SECS", "soon"),
            ("DERIBIT_METRICS_PORT", "-1"),
        ])
        .unwrap();
        assert_eq!(config.endpoint.port, "443");
        assert_eq!(config.websocket.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.server.metrics_port, 0);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = config_from(&[("DERIBIT_CONNECT_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("DERIBIT_CONNECT_TIMEOUT_SECS"));
    }

    #[test]
    fn grouped_channel() {
        let config = config_from(&[
            ("DERIBIT_BOOK_GROUP", "none"),
            ("DERIBIT_BOOK_DEPTH", "10"),
        ])
        .unwrap();
        assert_eq!(
            config.channel.book_channel().channel_for("BTC-PERPETUAL"),
            "book.BTC-PERPETUAL.none.10.100ms"
        );
    }

    #[test]
    fn group_without_depth_rejected() {
        let err = config_from(&[("DERIBIT_BOOK_GROUP", "none")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "DERIBIT_BOOK_DEPTH"));
    }

    #[test]
    fn session_config_carries_settings() {
        let config = config_from(&[
            ("DERIBIT_BOOK_INTERVAL", "raw"),
            ("DERIBIT_CONNECT_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        let session = config.session_config("ETH-PERPETUAL");
        assert_eq!(session.host, "www.deribit.com");
        assert_eq!(session.port, "443");
        assert_eq!(session.path, "/ws/api/v2");
        assert_eq!(session.connect_timeout, Duration::from_secs(5));
        assert_eq!(
            session.subscribe_request().params.channels,
            vec!["book.ETH-PERPETUAL.raw"]
        );
    }

    #[test]
    fn websocket_settings_defaults() {
        let settings = WebSocketSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
        assert_eq!(settings.handshake_timeout, Duration::from_secs(30));
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(settings.heartbeat_timeout, Duration::from_secs(60));
        assert_eq!(settings.max_message_size, 16_777_216);
    }
}
