//! Prometheus metrics for monitoring bridge health and throughput.
//!
//! Metrics are exposed in Prometheus text format when `METRICS_BIND` is set.
//! Without an installed exporter every call here is a no-op.
//!
//! # Metrics Categories
//!
//! - **Relay Metrics**: Active and total relays, close reasons, lifetime
//! - **Traffic Metrics**: Frames, messages and bytes per direction
//! - **Backend Metrics**: Connect failures
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use gw_bridge::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::relays_total();
//! metrics::relays_active(1);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

const TO_CLIENT: &str = "to_client";
const TO_BACKEND: &str = "to_backend";

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Relay Metrics
// ============================================================================

/// Set current active relay count.
pub fn relays_active(count: usize) {
    metrics::gauge!("bridge_relays_active").set(count as f64);
}

/// Increment total relays counter.
pub fn relays_total() {
    metrics::counter!("bridge_relays_total").increment(1);
}

/// Record why a relay ended.
pub fn relay_closed(reason: &'static str) {
    metrics::counter!("bridge_relay_closed_total", "reason" => reason).increment(1);
}

/// Record relay lifetime in milliseconds.
pub fn relay_duration_ms(duration_ms: f64) {
    metrics::histogram!("bridge_relay_duration_ms").record(duration_ms);
}

// ============================================================================
// Traffic Metrics
// ============================================================================

/// Count one reassembled frame sent to the client.
pub fn frame_to_client(bytes: usize) {
    metrics::counter!("bridge_frames_total", "direction" => TO_CLIENT).increment(1);
    metrics::counter!("bridge_bytes_total", "direction" => TO_CLIENT).increment(bytes as u64);
}

/// Count one client message written to the backend.
pub fn message_to_backend(bytes: usize) {
    metrics::counter!("bridge_frames_total", "direction" => TO_BACKEND).increment(1);
    metrics::counter!("bridge_bytes_total", "direction" => TO_BACKEND).increment(bytes as u64);
}

// ============================================================================
// Backend Metrics
// ============================================================================

/// Increment backend connect failures.
pub fn backend_connect_failures() {
    metrics::counter!("bridge_backend_connect_failures_total").increment(1);
}
