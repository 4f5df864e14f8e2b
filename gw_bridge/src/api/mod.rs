//! HTTP/WebSocket surface of the bridge.
//!
//! # Endpoints Overview
//!
//! - `GET /` and `GET /ws` - WebSocket upgrade, one relay per connection
//! - `GET /health` - Bridge health status with relay counts
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use gw_bridge::api::{AppState, create_router};
//! use gw_bridge::config::BridgeConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(BridgeConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod websocket;

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;

use crate::config::BridgeConfig;

/// Application state shared across all HTTP handlers and relays.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub relays: Arc<RelayCounters>,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config: Arc::new(config),
            relays: Arc::new(RelayCounters::default()),
        }
    }
}

/// Live and lifetime relay counts.
#[derive(Debug, Default)]
pub struct RelayCounters {
    active: AtomicUsize,
    total: AtomicU64,
}

impl RelayCounters {
    /// Record a new relay; returns the active count including it.
    pub fn opened(&self) -> usize {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record a finished relay; returns the remaining active count.
    pub fn closed(&self) -> usize {
        self.active.fetch_sub(1, Ordering::AcqRel).saturating_sub(1)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Create the bridge router.
///
/// ```text
/// GET /        - WebSocket upgrade
/// GET /ws      - WebSocket upgrade
/// GET /health  - Health check
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(websocket::websocket_handler))
        .route("/ws", get(websocket::websocket_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// The bridge holds no state beyond its relays, so it is healthy while it can
/// answer.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","backend":"127.0.0.1:5500","relays":{"active":0,"total":0},...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.config.backend_addr(),
        "relays": {
            "active": state.relays.active(),
            "total": state.relays.total(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_counters() {
        let counters = RelayCounters::default();
        assert_eq!(counters.opened(), 1);
        assert_eq!(counters.opened(), 2);
        assert_eq!(counters.closed(), 1);
        assert_eq!(counters.active(), 1);
        assert_eq!(counters.total(), 2);
    }
}
