//! WebSocket ↔ TCP bridge for gamewire frames.
//!
//! Each accepted WebSocket connection gets its own outbound TCP connection to
//! the game server. Client messages are written to the backend verbatim;
//! backend bytes are reassembled into whole frames and forwarded one frame
//! per WebSocket message.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod relay;
