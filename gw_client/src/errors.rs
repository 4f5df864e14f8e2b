//! Client error types.

use std::time::Duration;

use gamewire::{
    correlation::CorrelationError,
    net::{FrameError, PayloadError},
};
use thiserror::Error;

/// Client errors
///
/// Cloneable: one in-flight connect attempt hands the same result to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No open connection
    #[error("Not connected")]
    NotConnected,

    /// WebSocket connect or handshake failed
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The connection did not open in time
    #[error("Connection not open after {0:?}")]
    OpenTimeout(Duration),

    /// Outgoing frame could not be encoded
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Body could not be encoded or decoded
    #[error("Payload error: {0}")]
    Payload(String),

    /// The request failed after it was sent
    #[error(transparent)]
    Request(#[from] CorrelationError),
}

impl ClientError {
    /// Server error opcode, if the server rejected the request.
    pub fn server_opcode(&self) -> Option<u16> {
        match self {
            ClientError::Request(e) => e.server_opcode(),
            _ => None,
        }
    }
}

impl From<PayloadError> for ClientError {
    fn from(e: PayloadError) -> Self {
        ClientError::Payload(e.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_opcode() {
        let err = ClientError::from(CorrelationError::Server {
            opcode: 401,
            message: "Session expired".to_string(),
        });
        assert_eq!(err.server_opcode(), Some(401));
        assert_eq!(err.to_string(), "Server error 0x0191: Session expired");
        assert_eq!(ClientError::NotConnected.server_opcode(), None);
    }
}
