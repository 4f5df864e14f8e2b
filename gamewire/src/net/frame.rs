//! Fixed 16-byte big-endian frame header codec.
//!
//! ```text
//! | magic (2) | version (1) | flags (1) | opcode (2) | reserved (2) | sequence (4) | length (4) | payload |
//! ```
//!
//! Encoding and decoding are pure functions over byte slices, so they can be
//! called from any task with its own buffer.

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    errors::{FrameError, Result},
    protocol_version::ProtocolVersion,
};

/// Header sentinel, ASCII `CG`.
pub const MAGIC: u16 = 0x4347;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest payload the 32-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// One complete header + payload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: ProtocolVersion,
    /// Unused by consumers, carried through unmodified.
    pub flags: u8,
    pub opcode: u16,
    /// Preserved, never interpreted.
    pub reserved: u16,
    pub sequence: u32,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with the current version and zeroed flags.
    pub fn new(opcode: u16, sequence: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            version: ProtocolVersion::current(),
            flags: 0,
            opcode,
            reserved: 0,
            sequence,
            payload: payload.into(),
        }
    }

    /// Total encoded length: header plus payload.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the frame, preserving `flags` and `reserved`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] if the payload cannot be
    /// described by the 32-bit length field.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let length = payload_length(self.payload.len())?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u16(MAGIC);
        buf.put_u8(self.version.as_byte());
        buf.put_u8(self.flags);
        buf.put_u16(self.opcode);
        buf.put_u16(self.reserved);
        buf.put_u32(self.sequence);
        buf.put_u32(length);
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }
}

/// Encode `payload` under `opcode` with the sender-assigned `sequence`.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] if the payload exceeds the range of
/// the length field.
pub fn encode(opcode: u16, payload: &[u8], sequence: u32) -> Result<Bytes> {
    Frame::new(opcode, sequence, Bytes::copy_from_slice(payload)).to_bytes()
}

/// Decode one frame from the head of `buf`.
///
/// On success returns the frame and the number of bytes consumed, which is
/// always `HEADER_SIZE + payload_length`. Trailing bytes are left untouched.
///
/// # Errors
///
/// - [`FrameError::ShortBuffer`] if fewer than 16 bytes are available
/// - [`FrameError::BadMagic`] if the sentinel mismatches
/// - [`FrameError::UnsupportedVersion`] for unknown versions
/// - [`FrameError::IncompletePayload`] if the payload has not fully arrived
pub fn decode(buf: &[u8]) -> Result<(Frame, usize)> {
    let (mut frame, consumed) = parse_header(buf)?;
    frame.payload = Bytes::copy_from_slice(&buf[HEADER_SIZE..consumed]);
    Ok((frame, consumed))
}

/// Split one complete frame off the head of `buf` without copying.
///
/// Returns the frame together with its exact encoded bytes; the frame's
/// payload is a slice of those bytes. Errors as [`decode`], in which case
/// `buf` is left untouched.
pub fn split_frame(buf: &mut BytesMut) -> Result<(Frame, Bytes)> {
    let (mut frame, consumed) = parse_header(buf)?;
    let raw = buf.split_to(consumed).freeze();
    frame.payload = raw.slice(HEADER_SIZE..);
    Ok((frame, raw))
}

/// Validate the header at the head of `buf` and check the payload has
/// arrived. The returned frame has an empty payload.
fn parse_header(buf: &[u8]) -> Result<(Frame, usize)> {
    if buf.len() < HEADER_SIZE {
        return Err(FrameError::ShortBuffer {
            needed: HEADER_SIZE,
            available: buf.len(),
        });
    }

    let magic = u16::from_be_bytes([buf[0], buf[1]]);
    if magic != MAGIC {
        return Err(FrameError::BadMagic(magic));
    }

    let version = ProtocolVersion::from_byte(buf[2]).ok_or(FrameError::UnsupportedVersion(buf[2]))?;
    let flags = buf[3];
    let opcode = u16::from_be_bytes([buf[4], buf[5]]);
    let reserved = u16::from_be_bytes([buf[6], buf[7]]);
    let sequence = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let length = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]) as usize;

    let available = buf.len() - HEADER_SIZE;
    if available < length {
        return Err(FrameError::IncompletePayload {
            expected: length,
            available,
        });
    }

    let frame = Frame {
        version,
        flags,
        opcode,
        reserved,
        sequence,
        payload: Bytes::new(),
    };
    Ok((frame, HEADER_SIZE + length))
}

/// Validate a payload length against the 32-bit length field.
pub(crate) fn payload_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        actual: len,
        max: MAX_PAYLOAD_SIZE,
    })
}
