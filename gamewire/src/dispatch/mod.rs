//! Opcode dispatch registry.
//!
//! Consumers register interest in specific opcodes; every decoded
//! [`Envelope`](crate::net::Envelope) is fanned out to the handlers for its
//! opcode in registration order, or to the default handlers when nothing
//! specific is registered.
//!
//! ## Example
//!
//! ```
//! use gamewire::dispatch::DispatchRegistry;
//! use gamewire::net::{Body, Envelope};
//!
//! let registry = DispatchRegistry::new();
//! let _login = registry.register(201, |env| {
//!     println!("login ok, seq {}", env.sequence);
//!     Ok(())
//! });
//!
//! let report = registry.dispatch(&Envelope::new(201, 7, Body::Empty));
//! assert_eq!(report.invoked, 1);
//! ```

pub mod registry;

pub use registry::{
    DefaultHandler, DispatchRegistry, DispatchReport, Handler, HandlerId, Registration,
};
