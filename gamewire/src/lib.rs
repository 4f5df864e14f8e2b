//! # gamewire
//!
//! Binary message transport and dispatch core shared by the bridge and the
//! client.
//!
//! ## Core Modules
//!
//! - [`net`]: 16-byte frame codec, stream reassembly, opcode table and typed
//!   envelopes
//! - [`dispatch`]: per-opcode handler registry with ordered fan-out and
//!   default fallbacks
//! - [`correlation`]: single-flight pending request map with deadlines
//!
//! ## Example
//!
//! ```
//! use gamewire::net::{StreamReassembler, encode};
//!
//! let bytes = encode(0x0101, br#"{"email":"a@b.com"}"#, 7).unwrap();
//! let mut reassembler = StreamReassembler::new();
//! assert!(reassembler.feed_all(&bytes[..10]).unwrap().is_empty());
//! let frames = reassembler.feed_all(&bytes[10..]).unwrap();
//! assert_eq!(frames[0].sequence, 7);
//! ```

/// Frame codec, reassembly and envelopes.
pub mod net;
pub use net::{Body, Envelope, Frame, FrameError, StreamReassembler, opcode};

/// Opcode dispatch registry.
pub mod dispatch;
pub use dispatch::{DispatchRegistry, DispatchReport, Registration};

/// Request/response correlation.
pub mod correlation;
pub use correlation::{CorrelationError, CorrelationKey, PendingReply, PendingRequests};
