//! Protocol versioning carried in the frame header.

use serde::{Deserialize, Serialize};

/// Wire protocol version byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// V1: 16-byte big-endian header, `0x4347` magic
    V1,
}

impl ProtocolVersion {
    /// Get the current protocol version
    pub fn current() -> Self {
        ProtocolVersion::V1
    }

    /// Parse the header version byte.
    ///
    /// Returns `None` for versions this build does not speak.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ProtocolVersion::V1),
            _ => None,
        }
    }

    /// The byte written into the header
    pub fn as_byte(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 1,
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}
