//! Bridge configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::{net::SocketAddr, time::Duration};

use gamewire::net::{HEADER_SIZE, reassembler::DEFAULT_MAX_BUFFERED};

/// Complete bridge configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// WebSocket listener address
    pub bind: SocketAddr,
    /// Game server host
    pub backend_host: String,
    /// Game server port
    pub backend_port: u16,
    /// How long a relay waits for the backend TCP connect
    pub backend_connect_timeout: Duration,
    /// Ceiling on buffered-but-unframed backend bytes per relay
    pub max_buffered_bytes: usize,
    /// Prometheus scrape listener, disabled when `None`
    pub metrics_bind: Option<SocketAddr>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend_host: "127.0.0.1".to_string(),
            backend_port: 5500,
            backend_connect_timeout: Duration::from_millis(5000),
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
            metrics_bind: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `backend_host_override` - Optional backend host override (from CLI args)
    /// * `backend_port_override` - Optional backend port override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a set variable cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        backend_host_override: Option<String>,
        backend_port_override: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_env("BRIDGE_BIND")?.unwrap_or(defaults.bind),
        };

        let backend_host = backend_host_override
            .or_else(|| std::env::var("BACKEND_HOST").ok())
            .unwrap_or(defaults.backend_host);

        let backend_port = match backend_port_override {
            Some(port) => port,
            None => parse_env("BACKEND_PORT")?.unwrap_or(defaults.backend_port),
        };

        let backend_connect_timeout = parse_env("BACKEND_CONNECT_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.backend_connect_timeout);

        let max_buffered_bytes =
            parse_env("MAX_BUFFERED_BYTES")?.unwrap_or(defaults.max_buffered_bytes);

        let metrics_bind = parse_env("METRICS_BIND")?;

        Ok(BridgeConfig {
            bind,
            backend_host,
            backend_port,
            backend_connect_timeout,
            max_buffered_bytes,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "BACKEND_HOST".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.backend_port == 0 {
            return Err(ConfigError::Invalid {
                var: "BACKEND_PORT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.backend_connect_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BACKEND_CONNECT_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.max_buffered_bytes < HEADER_SIZE {
            return Err(ConfigError::Invalid {
                var: "MAX_BUFFERED_BYTES".to_string(),
                reason: format!("Must hold at least one frame header ({HEADER_SIZE} bytes)"),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the bridge bind address ({})", self.bind),
            });
        }

        Ok(())
    }

    /// `host:port` of the game server
    pub fn backend_addr(&self) -> String {
        format!("{}:{}", self.backend_host, self.backend_port)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional environment variable; unset is `None`, unparsable is an error
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("{e} (got {raw:?})"),
            }),
        Err(_) => Ok(None),
    }
}
