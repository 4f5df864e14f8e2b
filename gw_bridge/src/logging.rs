//! Structured logging configuration.
//!
//! Relay lifecycle events are logged with structured fields so a single relay
//! can be followed by its id.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` (default `info`). Records emitted through
/// the `log` facade by `gamewire` are captured as well.
///
/// # Example
///
/// ```no_run
/// use gw_bridge::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Bridge starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tungstenite=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a newly accepted client connection
///
/// # Arguments
///
/// * `relay_id` - Relay identifier
/// * `backend` - Backend address the relay will dial
/// * `active` - Relays open including this one
pub fn log_relay_opened(relay_id: &str, backend: &str, active: usize) {
    tracing::info!(
        relay_id = relay_id,
        backend = backend,
        active_relays = active,
        "Relay opened"
    );
}

/// Log the end of a relay
///
/// # Arguments
///
/// * `relay_id` - Relay identifier
/// * `outcome` - Close reason label
/// * `duration_ms` - Relay lifetime in milliseconds
/// * `frames_to_client` - Frames forwarded backend → client
/// * `messages_to_backend` - Messages forwarded client → backend
pub fn log_relay_closed(
    relay_id: &str,
    outcome: &str,
    duration_ms: u64,
    frames_to_client: u64,
    messages_to_backend: u64,
) {
    tracing::info!(
        relay_id = relay_id,
        outcome = outcome,
        duration_ms = duration_ms,
        frames_to_client = frames_to_client,
        messages_to_backend = messages_to_backend,
        "Relay closed"
    );
}

/// Log a failed backend connect
pub fn log_backend_unavailable(relay_id: &str, backend: &str, error: &str) {
    tracing::warn!(
        relay_id = relay_id,
        backend = backend,
        error = error,
        "Backend unavailable"
    );
}

/// Log a framing violation on the backend stream
pub fn log_protocol_violation(relay_id: &str, error: &str, buffered: usize) {
    tracing::error!(
        relay_id = relay_id,
        error = error,
        buffered_bytes = buffered,
        "PROTOCOL: closing relay"
    );
}
