//! Client side of the gamewire transport.
//!
//! [`connection::ConnectionManager`] owns the WebSocket, the dispatch loop and
//! the pending request map; [`session::GameSession`] layers the request API
//! and the built-in account routes on top. The `gw_client` binary is a small
//! shell over both.

pub mod commands;
pub mod config;
pub mod connection;
pub mod errors;
pub mod session;
