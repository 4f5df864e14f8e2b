//! Network error types for frame encoding, decoding and reassembly.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or reassembling frames.
///
/// `ShortBuffer` and `IncompletePayload` are recoverable: the caller keeps the
/// bytes and retries once more data arrives. Every other variant is fatal for
/// the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer than a full header is available
    #[error("Short buffer: need {needed} header bytes, have {available}")]
    ShortBuffer { needed: usize, available: usize },

    /// Header parsed but the payload has not fully arrived
    #[error("Incomplete payload: need {expected} bytes, have {available}")]
    IncompletePayload { expected: usize, available: usize },

    /// The magic sentinel did not match
    #[error("Bad magic 0x{0:04X}")]
    BadMagic(u16),

    /// The header carried a protocol version this build does not speak
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Payload does not fit the 32-bit length field or the configured limit
    #[error("Payload size {actual} exceeds maximum {max}")]
    PayloadTooLarge { actual: usize, max: usize },

    /// Unframed bytes grew past the reassembly ceiling
    #[error("Reassembly buffer holds {buffered} bytes, limit is {limit}")]
    BufferOverflow { buffered: usize, limit: usize },
}

impl FrameError {
    /// Whether more input may turn this error into a successful decode.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::ShortBuffer { .. } | FrameError::IncompletePayload { .. }
        )
    }

    /// Whether the connection holding the stream must be torn down.
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Whether this is a protocol violation rather than a decoding error.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            FrameError::UnsupportedVersion(_) | FrameError::BufferOverflow { .. }
        )
    }
}

/// Errors raised while turning a payload into a typed body.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// JSON payload failed to parse
    #[error("Invalid JSON payload for opcode 0x{opcode:04X}: {source}")]
    Json {
        opcode: u16,
        #[source]
        source: serde_json::Error,
    },

    /// Fixed-size binary record had the wrong length
    #[error("Invalid record for opcode 0x{opcode:04X}: expected {expected} bytes, got {actual}")]
    RecordSize {
        opcode: u16,
        expected: usize,
        actual: usize,
    },

    /// Failed to serialize an outgoing body
    #[error("Failed to encode body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
