//! Client configuration.

use std::{fmt, str::FromStr, time::Duration};

/// How responses are matched to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationMode {
    /// One slot per logical operation; a second request of the same kind
    /// supersedes the first.
    Category,
    /// Keyed by the request sequence, which the server echoes.
    #[default]
    Sequence,
}

impl FromStr for CorrelationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(CorrelationMode::Category),
            "sequence" | "seq" => Ok(CorrelationMode::Sequence),
            other => Err(format!("unknown correlation mode '{other}'")),
        }
    }
}

impl fmt::Display for CorrelationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationMode::Category => write!(f, "category"),
            CorrelationMode::Sequence => write!(f, "sequence"),
        }
    }
}

/// Complete client configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bridge WebSocket URL
    pub url: String,
    /// Deadline for each correlated request
    pub request_timeout: Duration,
    /// Deadline for the WebSocket handshake
    pub open_timeout: Duration,
    pub correlation_mode: CorrelationMode,
    /// Session token used to resume after reconnecting
    pub session_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(15),
            open_timeout: Duration::from_secs(5),
            correlation_mode: CorrelationMode::default(),
            session_id: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `url_override` - Optional bridge URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a set variable cannot be parsed
    pub fn from_env(url_override: Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = url_override
            .or_else(|| std::env::var("BRIDGE_URL").ok())
            .unwrap_or(defaults.url);

        let request_timeout = parse_env("REQUEST_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);

        let open_timeout = parse_env("OPEN_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.open_timeout);

        let correlation_mode =
            parse_env("CORRELATION_MODE")?.unwrap_or(defaults.correlation_mode);

        let session_id = std::env::var("SESSION_ID")
            .ok()
            .filter(|token| !token.trim().is_empty());

        Ok(ClientConfig {
            url,
            request_timeout,
            open_timeout,
            correlation_mode,
            session_id,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_URL".to_string(),
                reason: format!("Must be a ws:// or wss:// URL (got {:?})", self.url),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.open_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "OPEN_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
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
