//! WebSocket upgrade handler.
//!
//! Every upgraded connection is handed to its own [`BridgeRelay`]. The client
//! speaks binary gamewire frames only:
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws');
//! ws.binaryType = 'arraybuffer';
//! ws.onmessage = (event) => handleFrame(new DataView(event.data));
//! ```

use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};

use super::AppState;
use crate::{logging, metrics, relay::BridgeRelay};

/// Upgrade the HTTP connection and start a relay.
///
/// # Response
///
/// `101 Switching Protocols`; the relay runs until either side closes.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let relay = BridgeRelay::new(&state.config);
    let relay_id = relay.id().to_string();

    let active = state.relays.opened();
    metrics::relays_total();
    metrics::relays_active(active);
    logging::log_relay_opened(&relay_id, &state.config.backend_addr(), active);

    let report = relay.run(socket).await;

    let active = state.relays.closed();
    metrics::relays_active(active);
    metrics::relay_closed(report.outcome.label());
    metrics::relay_duration_ms(report.duration.as_secs_f64() * 1000.0);
    logging::log_relay_closed(
        &relay_id,
        report.outcome.label(),
        report.duration.as_millis() as u64,
        report.stats.frames_to_client,
        report.stats.messages_to_backend,
    );
}
