//! Correlation error types.

use std::time::Duration;

use thiserror::Error;

/// Ways a pending request can fail.
///
/// Cloneable so one failure (such as connection loss) can be handed to every
/// outstanding waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// No response arrived before the deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A newer request for the same key replaced this one
    #[error("Request superseded by a newer request")]
    Superseded,

    /// The server answered with an error opcode
    #[error("Server error 0x{opcode:04X}: {message}")]
    Server { opcode: u16, message: String },

    /// The connection was lost while the request was outstanding
    #[error("Connection lost")]
    Disconnected,

    /// The request was dropped without an answer
    #[error("Request cancelled")]
    Cancelled,
}

impl CorrelationError {
    /// Server error opcode, if the server rejected the request.
    pub fn server_opcode(&self) -> Option<u16> {
        match self {
            CorrelationError::Server { opcode, .. } => Some(*opcode),
            _ => None,
        }
    }
}

/// Result type for correlated requests
pub type CorrelationResult<T> = Result<T, CorrelationError>;
