//! One client ↔ backend relay.
//!
//! # Flow
//!
//! 1. Dial the backend (bounded by the connect timeout). Client traffic is not
//!    read until this succeeds.
//! 2. Relay both directions concurrently:
//!    - client binary message → written to the backend verbatim
//!    - backend bytes → reassembled → one binary message per frame, FIFO
//!
//!    A slow peer only stalls the direction writing to it.
//! 3. When either direction ends, close the other side and stop. Nothing is
//!    forwarded after that point and partial frames are dropped.

use std::{
    fmt,
    time::{Duration, Instant},
};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, Stream, StreamExt};
use gamewire::net::{FrameError, StreamReassembler, opcode};
use log::{debug, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use uuid::Uuid;

use crate::{config::BridgeConfig, logging, metrics};

const READ_CHUNK: usize = 16 * 1024;

/// How a relay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The client closed or dropped the WebSocket
    ClientClosed,
    /// The backend closed the TCP stream
    BackendClosed,
    /// The backend could not be reached
    BackendUnavailable(String),
    /// The backend stream broke framing rules
    ProtocolViolation(FrameError),
    /// An I/O error on either side
    TransportError(String),
}

impl RelayOutcome {
    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RelayOutcome::ClientClosed => "client_closed",
            RelayOutcome::BackendClosed => "backend_closed",
            RelayOutcome::BackendUnavailable(_) => "backend_unavailable",
            RelayOutcome::ProtocolViolation(_) => "protocol_violation",
            RelayOutcome::TransportError(_) => "transport_error",
        }
    }
}

impl fmt::Display for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayOutcome::ClientClosed => write!(f, "client closed"),
            RelayOutcome::BackendClosed => write!(f, "backend closed"),
            RelayOutcome::BackendUnavailable(e) => write!(f, "backend unavailable: {e}"),
            RelayOutcome::ProtocolViolation(e) => write!(f, "protocol violation: {e}"),
            RelayOutcome::TransportError(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// Per-relay traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub frames_to_client: u64,
    pub bytes_to_client: u64,
    pub messages_to_backend: u64,
    pub bytes_to_backend: u64,
}

/// Result of [`BridgeRelay::run`].
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub stats: RelayStats,
    pub duration: Duration,
}

/// A relay between one accepted WebSocket and one backend TCP connection.
#[derive(Debug, Clone)]
pub struct BridgeRelay {
    id: Uuid,
    backend: String,
    connect_timeout: Duration,
    max_buffered: usize,
}

impl BridgeRelay {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend: config.backend_addr(),
            connect_timeout: config.backend_connect_timeout,
            max_buffered: config.max_buffered_bytes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Relay until either side closes.
    ///
    /// # Arguments
    ///
    /// * `socket` - Upgraded client WebSocket
    ///
    /// # Returns
    ///
    /// * `RelayReport` - Why the relay ended plus traffic counters
    pub async fn run(self, mut socket: WebSocket) -> RelayReport {
        let started = Instant::now();
        let relay_id = self.id.to_string();

        let backend = match self.connect_backend().await {
            Ok(stream) => stream,
            Err(e) => {
                logging::log_backend_unavailable(&relay_id, &self.backend, &e);
                metrics::backend_connect_failures();
                close_client(&mut socket, close_code::ERROR, "backend unavailable").await;
                return RelayReport {
                    outcome: RelayOutcome::BackendUnavailable(e),
                    stats: RelayStats::default(),
                    duration: started.elapsed(),
                };
            }
        };
        // Small frames must not wait on Nagle.
        let _ = backend.set_nodelay(true);
        debug!("relay {relay_id} connected to {}", self.backend);

        let (outcome, stats) = self.pump(&relay_id, socket, backend).await;
        RelayReport {
            outcome,
            stats,
            duration: started.elapsed(),
        }
    }

    async fn connect_backend(&self) -> Result<TcpStream, String> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.backend)).await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("connect timed out after {:?}", self.connect_timeout)),
        }
    }

    async fn pump(
        &self,
        relay_id: &str,
        socket: WebSocket,
        backend: TcpStream,
    ) -> (RelayOutcome, RelayStats) {
        let (mut client_tx, mut client_rx) = socket.split();
        let (mut backend_rx, mut backend_tx) = backend.into_split();
        let mut reassembler = StreamReassembler::with_limit(self.max_buffered);
        let mut upstream = RelayStats::default();
        let mut downstream = RelayStats::default();

        let outcome = tokio::select! {
            outcome = client_to_backend(relay_id, &mut client_rx, &mut backend_tx, &mut upstream) => outcome,
            outcome = backend_to_client(&mut backend_rx, &mut client_tx, &mut reassembler, &mut downstream) => outcome,
        };
        let stats = RelayStats {
            messages_to_backend: upstream.messages_to_backend,
            bytes_to_backend: upstream.bytes_to_backend,
            ..downstream
        };

        match &outcome {
            RelayOutcome::ClientClosed => {
                let _ = backend_tx.shutdown().await;
            }
            RelayOutcome::BackendClosed => {
                let _ = client_tx
                    .send(close_message(close_code::NORMAL, "backend closed"))
                    .await;
            }
            RelayOutcome::ProtocolViolation(e) => {
                logging::log_protocol_violation(relay_id, &e.to_string(), reassembler.buffered());
                let _ = client_tx
                    .send(close_message(close_code::PROTOCOL, "backend framing error"))
                    .await;
            }
            RelayOutcome::TransportError(e) => {
                warn!("relay {relay_id}: {e}");
                let _ = client_tx
                    .send(close_message(close_code::ERROR, "transport error"))
                    .await;
            }
            RelayOutcome::BackendUnavailable(_) => {}
        }
        // Dropping the halves closes both sockets.
        (outcome, stats)
    }
}

/// Write every client binary message to the backend until one side stops.
async fn client_to_backend<R, E, W>(
    relay_id: &str,
    client_rx: &mut R,
    backend_tx: &mut W,
    stats: &mut RelayStats,
) -> RelayOutcome
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
    W: AsyncWrite + Unpin,
{
    loop {
        match client_rx.next().await {
            Some(Ok(Message::Binary(data))) => {
                if let Err(e) = backend_tx.write_all(&data).await {
                    return RelayOutcome::TransportError(format!("backend write: {e}"));
                }
                stats.messages_to_backend += 1;
                stats.bytes_to_backend += data.len() as u64;
                metrics::message_to_backend(data.len());
            }
            Some(Ok(Message::Text(_))) => {
                warn!("relay {relay_id} ignoring text message; protocol is binary");
            }
            Some(Ok(Message::Close(_))) | None => return RelayOutcome::ClientClosed,
            Some(Ok(_)) => {}
            Some(Err(e)) => return RelayOutcome::TransportError(format!("client read: {e}")),
        }
    }
}

/// Read backend bytes and forward each complete frame until one side stops.
async fn backend_to_client<R, S>(
    backend_rx: &mut R,
    client_tx: &mut S,
    reassembler: &mut StreamReassembler,
    stats: &mut RelayStats,
) -> RelayOutcome
where
    R: AsyncRead + Unpin,
    S: SinkExt<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match backend_rx.read(&mut chunk).await {
            Ok(0) => return RelayOutcome::BackendClosed,
            Ok(n) => {
                if let Err(outcome) = forward_frames(reassembler, &chunk[..n], client_tx, stats).await {
                    return outcome;
                }
            }
            Err(e) => return RelayOutcome::TransportError(format!("backend read: {e}")),
        }
    }
}

/// Reassemble `chunk` and send each complete frame as one binary message,
/// byte for byte as the backend wrote it.
async fn forward_frames<S>(
    reassembler: &mut StreamReassembler,
    chunk: &[u8],
    client_tx: &mut S,
    stats: &mut RelayStats,
) -> Result<(), RelayOutcome>
where
    S: SinkExt<Message> + Unpin,
    S::Error: fmt::Display,
{
    for item in reassembler.feed_raw(chunk) {
        let (frame, raw) = item.map_err(RelayOutcome::ProtocolViolation)?;
        debug!(
            "backend -> client {} seq={} len={}",
            opcode::describe(frame.opcode),
            frame.sequence,
            frame.payload.len()
        );
        let len = raw.len();
        client_tx
            .send(Message::Binary(raw))
            .await
            .map_err(|e| RelayOutcome::TransportError(format!("client write: {e}")))?;
        stats.frames_to_client += 1;
        stats.bytes_to_client += len as u64;
        metrics::frame_to_client(len);
    }
    Ok(())
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

async fn close_client(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket.send(close_message(code, reason)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RelayOutcome::ClientClosed.label(), "client_closed");
        assert_eq!(
            RelayOutcome::ProtocolViolation(FrameError::BadMagic(0)).label(),
            "protocol_violation"
        );
    }

    #[test]
    fn test_outcome_display() {
        let outcome = RelayOutcome::ProtocolViolation(FrameError::BadMagic(0xDEAD));
        assert_eq!(outcome.to_string(), "protocol violation: Bad magic 0xDEAD");
    }

    #[test]
    fn test_relay_from_config() {
        let config = BridgeConfig {
            backend_host: "10.0.0.5".to_string(),
            backend_port: 6000,
            ..BridgeConfig::default()
        };
        let a = BridgeRelay::new(&config);
        let b = BridgeRelay::new(&config);
        assert_eq!(a.backend, "10.0.0.5:6000");
        assert_ne!(a.id(), b.id());
    }

    fn frame_with_header_bits(opcode: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = gamewire::net::encode(opcode, payload, seq).unwrap().to_vec();
        bytes[3] = 0x5A;
        bytes[6..8].copy_from_slice(&0xCAFEu16.to_be_bytes());
        bytes
    }

    #[tokio::test]
    async fn test_forward_frames_sends_bytes_as_received() {
        let first = frame_with_header_bits(opcode::RES_ROOM_STATE, 3, br#"{"players":[]}"#);
        let second = frame_with_header_bits(opcode::NTF_PLAYER_JOINED, 0, b"{}");
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut reassembler = StreamReassembler::new();
        let mut sent: Vec<Message> = Vec::new();
        let mut stats = RelayStats::default();
        forward_frames(&mut reassembler, &stream, &mut sent, &mut stats)
            .await
            .unwrap();

        assert_eq!(
            sent,
            vec![Message::Binary(first.into()), Message::Binary(second.into())]
        );
        assert_eq!(stats.frames_to_client, 2);
        assert_eq!(stats.bytes_to_client, stream.len() as u64);
    }

    #[tokio::test]
    async fn test_backend_to_client_drains_then_reports_close() {
        let stream = frame_with_header_bits(opcode::RES_HEARTBEAT_OK, 9, b"{}");
        let mut backend: &[u8] = &stream;
        let mut reassembler = StreamReassembler::new();
        let mut sent: Vec<Message> = Vec::new();
        let mut stats = RelayStats::default();

        let outcome = backend_to_client(&mut backend, &mut sent, &mut reassembler, &mut stats).await;
        assert_eq!(outcome, RelayOutcome::BackendClosed);
        assert_eq!(sent, vec![Message::Binary(stream.into())]);
    }

    #[tokio::test]
    async fn test_backend_to_client_stops_on_bad_magic() {
        let mut backend: &[u8] = &[0xFF; 32];
        let mut reassembler = StreamReassembler::new();
        let mut sent: Vec<Message> = Vec::new();
        let mut stats = RelayStats::default();

        let outcome = backend_to_client(&mut backend, &mut sent, &mut reassembler, &mut stats).await;
        assert_eq!(
            outcome,
            RelayOutcome::ProtocolViolation(FrameError::BadMagic(0xFFFF))
        );
        assert!(sent.is_empty());
    }
}
