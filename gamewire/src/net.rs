//! Wire layer: frame codec, stream reassembly and typed envelopes.
//!
//! Frames are a fixed 16-byte big-endian header followed by an opaque
//! payload. Everything in this module is synchronous and never blocks.

/// Typed frames decoded per opcode schema.
pub mod envelope;

/// Frame and payload error types.
pub mod errors;

/// 16-byte header encoding and decoding.
pub mod frame;

/// Well-known opcode table.
pub mod opcode;

/// Protocol versioning carried in the header.
pub mod protocol_version;

/// Byte-stream to frame reassembly.
pub mod reassembler;

pub use envelope::{Body, Envelope};
pub use errors::{FrameError, PayloadError};
pub use frame::{Frame, HEADER_SIZE, MAGIC, decode, encode, split_frame};
pub use protocol_version::ProtocolVersion;
pub use reassembler::StreamReassembler;
