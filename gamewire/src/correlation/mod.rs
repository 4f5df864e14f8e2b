//! Request/response correlation.
//!
//! Every outstanding request is a single-flight entry in a shared map keyed by
//! a [`CorrelationKey`]. An entry is settled exactly once: by a matching
//! response, its deadline, a newer request for the same key, or connection
//! loss.
//!
//! ## Example
//!
//! ```
//! use gamewire::correlation::{CorrelationKey, PendingRequests};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pending: PendingRequests<String> = PendingRequests::new();
//! let reply = pending.begin(CorrelationKey::category("login"), Duration::from_secs(15));
//! assert!(pending.resolve(&CorrelationKey::category("login"), "ok".to_string()));
//! assert_eq!(reply.await.unwrap(), "ok");
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{CorrelationError, CorrelationResult};
pub use manager::PendingRequests;
pub use models::{CorrelationKey, PendingReply};
