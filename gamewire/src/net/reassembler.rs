//! Frame reassembly over a byte stream.
//!
//! A stream socket preserves no message boundaries: one read may carry zero,
//! one or many frames and any frame may be split across reads. The
//! [`StreamReassembler`] owns the unframed tail of one connection and turns
//! arbitrarily chunked input back into whole frames.
//!
//! A corrupted stream is never resynchronized. Once a fatal error is seen the
//! reassembler is poisoned and keeps reporting that error.

use bytes::{Bytes, BytesMut};
use log::{debug, error};

use super::{
    errors::{FrameError, Result},
    frame::{self, Frame, HEADER_SIZE},
};

/// Default ceiling on buffered-but-unframed bytes (1 MiB).
pub const DEFAULT_MAX_BUFFERED: usize = 1024 * 1024;

/// Per-connection frame reassembler.
#[derive(Debug)]
pub struct StreamReassembler {
    buffer: BytesMut,
    max_buffered: usize,
    poisoned: Option<FrameError>,
}

impl StreamReassembler {
    /// Create a reassembler with the default buffer ceiling.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BUFFERED)
    }

    /// Create a reassembler that refuses to hold more than `max_buffered`
    /// unframed bytes.
    pub fn with_limit(max_buffered: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_buffered.min(64 * 1024)),
            max_buffered,
            poisoned: None,
        }
    }

    /// Append `chunk` and return a lazy iterator over the frames now complete.
    ///
    /// Frames not pulled from the iterator stay buffered and are yielded by
    /// the next call. The iterator stops at the first error it yields.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        Frames {
            inner: self.feed_raw(chunk),
        }
    }

    /// Like [`feed`](Self::feed), but also yields each frame's encoded bytes
    /// exactly as they arrived, for forwarding without re-encoding.
    pub fn feed_raw(&mut self, chunk: &[u8]) -> RawFrames<'_> {
        if self.poisoned.is_none() {
            self.buffer.extend_from_slice(chunk);
        }
        RawFrames {
            reassembler: self,
            done: false,
        }
    }

    /// Append `chunk` and collect every complete frame.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; frames decoded before it are lost along
    /// with the connection.
    pub fn feed_all(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        self.feed(chunk).collect()
    }

    /// Number of buffered bytes not yet framed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The fatal error that poisoned this reassembler, if any.
    pub fn poisoned(&self) -> Option<&FrameError> {
        self.poisoned.as_ref()
    }

    fn next_frame(&mut self) -> Option<Result<(Frame, Bytes)>> {
        if let Some(err) = &self.poisoned {
            return Some(Err(err.clone()));
        }

        match frame::split_frame(&mut self.buffer) {
            Ok((frame, raw)) => {
                debug!(
                    "reassembled frame opcode=0x{:04X} seq={} len={} residual={}",
                    frame.opcode,
                    frame.sequence,
                    frame.payload.len(),
                    self.buffer.len()
                );
                Some(Ok((frame, raw)))
            }
            Err(FrameError::IncompletePayload { expected, .. })
                if expected
                    .checked_add(HEADER_SIZE)
                    .is_none_or(|needed| needed > self.max_buffered) =>
            {
                Some(Err(self.poison(FrameError::BufferOverflow {
                    buffered: expected.saturating_add(HEADER_SIZE),
                    limit: self.max_buffered,
                })))
            }
            Err(err) if err.is_recoverable() => {
                if self.buffer.len() > self.max_buffered {
                    Some(Err(self.poison(FrameError::BufferOverflow {
                        buffered: self.buffer.len(),
                        limit: self.max_buffered,
                    })))
                } else {
                    None
                }
            }
            Err(err) => Some(Err(self.poison(err))),
        }
    }

    fn poison(&mut self, err: FrameError) -> FrameError {
        error!("stream poisoned: {err}");
        self.buffer.clear();
        self.poisoned = Some(err.clone());
        err
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy sequence of frames produced by one [`StreamReassembler::feed`] call.
pub struct Frames<'a> {
    inner: RawFrames<'a>,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|item| item.map(|(frame, _)| frame))
    }
}

/// Frames paired with their encoded bytes, from [`StreamReassembler::feed_raw`].
pub struct RawFrames<'a> {
    reassembler: &'a mut StreamReassembler,
    done: bool,
}

impl Iterator for RawFrames<'_> {
    type Item = Result<(Frame, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.reassembler.next_frame();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
