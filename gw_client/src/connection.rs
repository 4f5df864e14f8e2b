//! WebSocket connection lifecycle, inbound dispatch and correlated requests.
//!
//! # Architecture
//!
//! - One writer task drains an unbounded channel into the socket, so sending
//!   never blocks the caller.
//! - One reader task decodes each binary message as a single frame, turns it
//!   into an [`Envelope`] and hands it to the [`DispatchRegistry`].
//!   Dispatch is synchronous inside that task.
//! - Responses settle entries in a shared [`PendingRequests`] map through
//!   handlers installed with [`ConnectionManager::route`].
//!
//! # State machine
//!
//! ```text
//! Disconnected -> Connecting -> Open -> Disconnected
//!                                 |
//!                                 +-> ReconnectPending -> Open
//! ```
//!
//! `ReconnectPending` runs one `CMD_RECONNECT` handshake with the stored
//! session token after every fresh open. A server answer of
//! `ERR_NOT_LOGGED_IN` or `ERR_BAD_REQUEST` turns resumption off for good.
//! There is no automatic reconnect loop.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use futures_util::{
    FutureExt, Sink, SinkExt, Stream, StreamExt,
    future::{BoxFuture, Shared},
};
use gamewire::{
    Body, DispatchRegistry, Envelope, Frame, FrameError, Registration,
    correlation::{CorrelationError, CorrelationKey, PendingRequests},
    net, opcode,
};
use log::{debug, info, warn};
use serde_json::json;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite};
use tungstenite::Message;

use crate::{
    config::{ClientConfig, CorrelationMode},
    errors::{ClientError, ClientResult},
};

/// Category used for the session-resumption handshake.
pub const RECONNECT: &str = "reconnect";

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Open, with the session-resumption handshake in flight
    ReconnectPending,
}

impl ConnectionState {
    /// Whether frames can be sent in this state.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            ConnectionState::Open | ConnectionState::ReconnectPending
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::ReconnectPending => write!(f, "resuming session"),
        }
    }
}

type ConnectAttempt = Shared<BoxFuture<'static, ClientResult<()>>>;

#[derive(Default)]
struct Link {
    /// Bumped on every open and every explicit close; stale reader tasks
    /// compare against it before touching state.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    connecting: Option<ConnectAttempt>,
    reader: Option<JoinHandle<()>>,
}

struct Inner {
    config: ClientConfig,
    registry: DispatchRegistry,
    pending: PendingRequests<Envelope>,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Link>,
    sequence: AtomicU32,
    session: Mutex<Option<String>>,
    resume_disabled: AtomicBool,
    _routes: Vec<Registration>,
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("connection {previous} -> {state}");
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<String>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tear down after the reader for `generation` stopped.
    fn on_disconnect(&self, generation: u64, reason: &str) {
        {
            let mut link = self.link();
            if link.generation != generation {
                return;
            }
            link.outbound = None;
            link.reader = None;
            self.set_state(ConnectionState::Disconnected);
        }
        let failed = self.pending.fail_all(CorrelationError::Disconnected);
        warn!("Connection lost ({reason}); failed {failed} pending request(s)");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let link = self.link.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(reader) = link.reader.take() {
            reader.abort();
        }
    }
}

/// Shared handle to one client connection.
///
/// Cloning is cheap; all clones drive the same socket, registry and pending
/// map.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a disconnected manager with its own registry.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_registry(config, DispatchRegistry::new())
    }

    /// Create a disconnected manager dispatching into `registry`.
    ///
    /// Installs the `reconnect` route and a default handler that settles
    /// sequence-keyed requests whose response opcode has no route.
    pub fn with_registry(config: ClientConfig, registry: DispatchRegistry) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let pending = PendingRequests::new();

        let mut routes = install_route(
            &registry,
            &pending,
            RECONNECT,
            &[opcode::RES_LOGIN_OK],
            &[opcode::ERR_NOT_LOGGED_IN, opcode::ERR_BAD_REQUEST],
        );
        let fallback = pending.clone();
        routes.push(registry.register_default(move |envelope| {
            Ok(settle(&fallback, None, envelope))
        }));

        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(config.session_id.clone()),
                config,
                registry,
                pending,
                state,
                link: Mutex::new(Link::default()),
                sequence: AtomicU32::new(1),
                resume_disabled: AtomicBool::new(false),
                _routes: routes,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &DispatchRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Stored session token.
    pub fn session_token(&self) -> Option<String> {
        self.inner.session().clone()
    }

    /// Replace the token used for session resumption.
    pub fn set_session_token(&self, token: Option<String>) {
        *self.inner.session() = token;
    }

    /// Whether a server rejection has turned session resumption off.
    pub fn resume_disabled(&self) -> bool {
        self.inner.resume_disabled.load(Ordering::Acquire)
    }

    /// Next outgoing sequence number, starting at 1.
    pub fn next_sequence(&self) -> u32 {
        self.inner.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Open the connection.
    ///
    /// Succeeds immediately if already open. Concurrent callers share one
    /// attempt and all see its result.
    ///
    /// # Errors
    ///
    /// * `ClientError::Connect` - Handshake failed
    /// * `ClientError::OpenTimeout` - Handshake did not finish in time
    pub async fn connect(&self) -> ClientResult<()> {
        let attempt = {
            let mut link = self.inner.link();
            if link.outbound.is_some() {
                return Ok(());
            }
            match &link.connecting {
                Some(attempt) => attempt.clone(),
                None => {
                    let attempt = establish(self.inner.clone()).boxed().shared();
                    link.connecting = Some(attempt.clone());
                    attempt
                }
            }
        };
        attempt.await
    }

    /// Wait until the connection is open.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::OpenTimeout` if it is not open within `timeout`.
    pub async fn wait_until_open(&self, timeout: Duration) -> ClientResult<()> {
        let mut rx = self.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|state| state.is_open())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ClientError::NotConnected),
            Err(_) => Err(ClientError::OpenTimeout(timeout)),
        }
    }

    /// Close the connection and fail every outstanding request with
    /// `Disconnected`.
    pub fn close(&self) {
        let (outbound, reader) = {
            let mut link = self.inner.link();
            link.generation += 1;
            link.connecting = None;
            self.inner.set_state(ConnectionState::Disconnected);
            (link.outbound.take(), link.reader.take())
        };
        if let Some(tx) = outbound {
            let _ = tx.send(Message::Close(None));
        }
        if let Some(reader) = reader {
            reader.abort();
        }
        let failed = self.inner.pending.fail_all(CorrelationError::Disconnected);
        info!("Connection closed; failed {failed} pending request(s)");
    }

    /// Queue one encoded frame for sending.
    ///
    /// # Errors
    ///
    /// * `ClientError::NotConnected` - No open connection
    /// * `ClientError::Frame` - Payload too large for the header
    pub fn send_frame(&self, frame: &Frame) -> ClientResult<()> {
        let bytes = frame.to_bytes()?;
        let link = self.inner.link();
        let tx = link.outbound.as_ref().ok_or(ClientError::NotConnected)?;
        tx.send(Message::Binary(bytes))
            .map_err(|_| ClientError::NotConnected)?;
        debug!(
            "-> {} seq={} len={}",
            opcode::describe(frame.opcode),
            frame.sequence,
            frame.payload.len()
        );
        Ok(())
    }

    /// Send `body` under `opcode` and wait for the correlated response.
    ///
    /// The pending entry is keyed by `category` or by the assigned sequence,
    /// depending on [`CorrelationMode`]. It exists before the frame is sent,
    /// so a fast response cannot be missed.
    ///
    /// # Errors
    ///
    /// * `ClientError::NotConnected` - No open connection
    /// * `ClientError::Request` - Timeout, supersession, server error or
    ///   connection loss
    pub async fn request(&self, category: &str, opcode: u16, body: Body) -> ClientResult<Envelope> {
        let mode = self.inner.config.correlation_mode;
        self.send_and_wait(opcode, body, |sequence| match mode {
            CorrelationMode::Category => CorrelationKey::category(category),
            CorrelationMode::Sequence => CorrelationKey::Sequence(sequence),
        })
        .await
    }

    /// Send `body` under an arbitrary `opcode` and wait for the response
    /// carrying the same sequence number.
    ///
    /// Always keyed by sequence, whatever the [`CorrelationMode`], so the
    /// default handler settles it without a category route.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request).
    pub async fn request_raw(&self, opcode: u16, body: Body) -> ClientResult<Envelope> {
        self.send_and_wait(opcode, body, CorrelationKey::Sequence).await
    }

    async fn send_and_wait(
        &self,
        opcode: u16,
        body: Body,
        key_for: impl FnOnce(u32) -> CorrelationKey,
    ) -> ClientResult<Envelope> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }

        let sequence = self.next_sequence();
        let frame = Envelope::new(opcode, sequence, body).into_frame()?;
        let key = key_for(sequence);

        let reply = self
            .inner
            .pending
            .begin(key.clone(), self.inner.config.request_timeout);
        if let Err(e) = self.send_frame(&frame) {
            self.inner.pending.cancel(&key);
            return Err(e);
        }

        Ok(reply.await?)
    }

    /// Route responses for `category`.
    ///
    /// Success opcodes resolve and failure opcodes reject the category's
    /// pending request. A response whose sequence matches a live
    /// sequence-keyed request settles that request instead.
    ///
    /// # Returns
    ///
    /// * `Vec<Registration>` - One token per opcode; dropping them removes
    ///   the route
    pub fn route(&self, category: &str, success: &[u16], failure: &[u16]) -> Vec<Registration> {
        install_route(
            &self.inner.registry,
            &self.inner.pending,
            category,
            success,
            failure,
        )
    }

    /// Run the resumption handshake for the connection opened as
    /// `generation`.
    async fn resume(self, token: String, generation: u64) {
        info!("Resuming stored session");
        let outcome = match Body::json(&json!({ "session_id": token })) {
            Ok(body) => self.request(RECONNECT, opcode::CMD_RECONNECT, body).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(_) => info!("Session resumed"),
            Err(e) => match e.server_opcode() {
                Some(opcode::ERR_NOT_LOGGED_IN | opcode::ERR_BAD_REQUEST) => {
                    warn!("Stored session rejected ({e}); not resuming again");
                    self.inner.resume_disabled.store(true, Ordering::Release);
                    self.set_session_token(None);
                }
                _ => warn!("Session resume failed: {e}"),
            },
        }

        let link = self.inner.link();
        if link.generation == generation && self.state() == ConnectionState::ReconnectPending {
            self.inner.set_state(ConnectionState::Open);
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn install_route(
    registry: &DispatchRegistry,
    pending: &PendingRequests<Envelope>,
    category: &str,
    success: &[u16],
    failure: &[u16],
) -> Vec<Registration> {
    success
        .iter()
        .chain(failure)
        .map(|&op| {
            let pending = pending.clone();
            let key = CorrelationKey::category(category);
            registry.register(op, move |envelope| {
                if !settle(&pending, Some(&key), envelope) {
                    debug!(
                        "{} with nothing pending for {key}",
                        opcode::describe(envelope.opcode)
                    );
                }
                Ok(())
            })
        })
        .collect()
}

/// Settle the request a response belongs to.
///
/// The live sequence key wins; otherwise `fallback` (a category slot) is
/// tried. Error opcodes reject with the server's message.
fn settle(
    pending: &PendingRequests<Envelope>,
    fallback: Option<&CorrelationKey>,
    envelope: &Envelope,
) -> bool {
    let by_sequence = CorrelationKey::Sequence(envelope.sequence);
    let key = if pending.contains(&by_sequence) {
        by_sequence
    } else {
        match fallback {
            Some(key) => key.clone(),
            None => return false,
        }
    };

    if envelope.is_error() {
        let message = envelope
            .body
            .error_message()
            .map(str::to_owned)
            .unwrap_or_else(|| opcode::describe(envelope.opcode));
        pending.reject(
            &key,
            CorrelationError::Server {
                opcode: envelope.opcode,
                message,
            },
        )
    } else {
        pending.resolve(&key, envelope.clone())
    }
}

async fn establish(inner: Arc<Inner>) -> ClientResult<()> {
    let started = {
        let link = inner.link();
        inner.set_state(ConnectionState::Connecting);
        link.generation
    };
    let url = inner.config.url.clone();
    let open_timeout = inner.config.open_timeout;
    debug!("Connecting to {url}");

    let handshake = tokio::time::timeout(open_timeout, connect_async(url.as_str())).await;
    let socket = match handshake {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => {
            return Err(abandon(
                &inner,
                started,
                ClientError::Connect {
                    url,
                    reason: e.to_string(),
                },
            ));
        }
        Err(_) => return Err(abandon(&inner, started, ClientError::OpenTimeout(open_timeout))),
    };

    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let resume = {
        let mut link = inner.link();
        if link.generation != started {
            // Closed while the handshake was running.
            return Err(ClientError::NotConnected);
        }
        link.generation += 1;
        let generation = link.generation;
        link.connecting = None;
        link.outbound = Some(tx);
        link.reader = Some(tokio::spawn(read_loop(
            Arc::downgrade(&inner),
            inner.registry.clone(),
            stream,
            generation,
        )));
        inner.set_state(ConnectionState::Open);

        let token = inner.session().clone();
        if let Some(token) = token.filter(|_| !inner.resume_disabled.load(Ordering::Acquire)) {
            inner.set_state(ConnectionState::ReconnectPending);
            Some((token, generation))
        } else {
            None
        }
    };
    tokio::spawn(write_loop(sink, rx));
    info!("Connected to {url}");

    if let Some((token, generation)) = resume {
        let manager = ConnectionManager {
            inner: inner.clone(),
        };
        tokio::spawn(manager.resume(token, generation));
    }

    Ok(())
}

fn abandon(inner: &Inner, started: u64, error: ClientError) -> ClientError {
    let mut link = inner.link();
    if link.generation == started {
        link.connecting = None;
        inner.set_state(ConnectionState::Disconnected);
    }
    warn!("{error}");
    error
}

async fn write_loop<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<Message>)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            warn!("WebSocket write failed: {e}");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop<S>(inner: Weak<Inner>, registry: DispatchRegistry, mut stream: S, generation: u64)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Binary(data))) => {
                if let Err(e) = dispatch_message(&registry, &data) {
                    break format!("framing error: {e}");
                }
            }
            Some(Ok(Message::Text(_))) => warn!("ignoring text message; protocol is binary"),
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => format!(
                        "closed by peer: {} {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "closed by peer".to_string(),
                };
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.on_disconnect(generation, &reason);
    }
}

/// Decode one WebSocket message as one frame and dispatch it.
///
/// Truncated messages and undecodable bodies are dropped. A fatal framing
/// error is returned and ends the connection.
fn dispatch_message(registry: &DispatchRegistry, data: &[u8]) -> Result<(), FrameError> {
    let (frame, consumed) = match net::decode(data) {
        Ok(decoded) => decoded,
        Err(e) if e.is_recoverable() => {
            warn!("dropping truncated message ({} bytes): {e}", data.len());
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    if consumed < data.len() {
        warn!(
            "ignoring {} trailing bytes after {}",
            data.len() - consumed,
            opcode::describe(frame.opcode)
        );
    }

    let envelope = match Envelope::from_frame(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("dropping frame: {e}");
            return Ok(());
        }
    };
    debug!(
        "<- {} seq={}",
        opcode::describe(envelope.opcode),
        envelope.sequence
    );
    registry.dispatch(&envelope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn manager(mode: CorrelationMode) -> ConnectionManager {
        ConnectionManager::new(ClientConfig {
            correlation_mode: mode,
            ..ClientConfig::default()
        })
    }

    fn error_envelope(op: u16, sequence: u32, message: &str) -> Envelope {
        Envelope::new(
            op,
            sequence,
            Body::Json(json!({ "error": message })),
        )
    }

    #[test]
    fn test_sequence_starts_at_one() {
        let manager = manager(CorrelationMode::Sequence);
        assert_eq!(manager.next_sequence(), 1);
        assert_eq!(manager.next_sequence(), 2);
        assert_eq!(manager.clone().next_sequence(), 3);
    }

    #[test]
    fn test_initial_state() {
        let manager = manager(CorrelationMode::Sequence);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_open());
        assert!(ConnectionState::ReconnectPending.is_open());
    }

    #[test]
    fn test_send_frame_requires_connection() {
        let manager = manager(CorrelationMode::Sequence);
        let frame = Frame::new(opcode::CMD_HEARTBEAT, 1, Vec::new());
        assert_eq!(manager.send_frame(&frame), Err(ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_request_requires_connection() {
        let manager = manager(CorrelationMode::Category);
        let result = manager
            .request("login", opcode::CMD_LOGIN_REQ, Body::Empty)
            .await;
        assert_eq!(result, Err(ClientError::NotConnected));
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_route_resolves_category() {
        let manager = manager(CorrelationMode::Category);
        let _routes = manager.route("login", &[opcode::RES_LOGIN_OK], &[opcode::ERR_BAD_REQUEST]);
        let reply = manager
            .inner
            .pending
            .begin("login".into(), Duration::from_secs(30));

        let response = Envelope::new(opcode::RES_LOGIN_OK, 9, Body::Json(json!({ "ok": true })));
        manager.registry().dispatch(&response);

        assert_eq!(reply.await, Ok(response));
    }

    #[tokio::test]
    async fn test_route_rejects_with_server_message() {
        let manager = manager(CorrelationMode::Category);
        let _routes = manager.route("login", &[opcode::RES_LOGIN_OK], &[opcode::ERR_BAD_REQUEST]);
        let reply = manager
            .inner
            .pending
            .begin("login".into(), Duration::from_secs(30));

        manager
            .registry()
            .dispatch(&error_envelope(opcode::ERR_BAD_REQUEST, 3, "Wrong password"));

        assert_eq!(
            reply.await,
            Err(CorrelationError::Server {
                opcode: opcode::ERR_BAD_REQUEST,
                message: "Wrong password".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_live_sequence_wins_over_category() {
        let manager = manager(CorrelationMode::Sequence);
        let _routes = manager.route("login", &[opcode::RES_LOGIN_OK], &[]);
        let by_category = manager
            .inner
            .pending
            .begin("login".into(), Duration::from_secs(30));
        let by_sequence = manager
            .inner
            .pending
            .begin(CorrelationKey::Sequence(4), Duration::from_secs(30));

        manager
            .registry()
            .dispatch(&Envelope::new(opcode::RES_LOGIN_OK, 4, Body::Empty));

        assert!(by_sequence.await.is_ok());
        assert!(manager.inner.pending.contains(&"login".into()));
        drop(by_category);
    }

    #[tokio::test]
    async fn test_default_handler_settles_unrouted_sequence() {
        let manager = manager(CorrelationMode::Sequence);
        let reply = manager
            .inner
            .pending
            .begin(CorrelationKey::Sequence(12), Duration::from_secs(30));

        let report = manager.registry().dispatch(&Envelope::new(
            opcode::RES_ROOM_JOINED,
            12,
            Body::Json(json!({ "roomId": 5 })),
        ));

        assert!(report.used_defaults);
        assert!(report.handled);
        assert_eq!(reply.await.map(|env| env.opcode), Ok(opcode::RES_ROOM_JOINED));
    }

    #[tokio::test]
    async fn test_sequence_key_settles_in_category_mode() {
        let manager = manager(CorrelationMode::Category);
        let reply = manager
            .inner
            .pending
            .begin(CorrelationKey::Sequence(5), Duration::from_millis(50));

        let report = manager.registry().dispatch(&Envelope::new(
            opcode::RES_ROOM_CREATED,
            5,
            Body::RoomCreated {
                room_id: 1,
                room_code: "K7QX".to_string(),
            },
        ));

        assert!(report.handled);
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(reply.await.map(|env| env.sequence), Ok(5));
    }

    #[tokio::test]
    async fn test_request_raw_requires_connection() {
        let manager = manager(CorrelationMode::Category);
        let result = manager.request_raw(opcode::CMD_CREATE_ROOM, Body::Empty).await;
        assert_eq!(result, Err(ClientError::NotConnected));
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_unsolicited_notification_is_unhandled() {
        let manager = manager(CorrelationMode::Sequence);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _chat = manager.registry().register(opcode::NTF_CHAT_MSG, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = manager.registry().dispatch(&Envelope::new(
            opcode::NTF_PLAYER_JOINED,
            0,
            Body::Empty,
        ));
        assert!(!report.handled);
        manager
            .registry()
            .dispatch(&Envelope::new(opcode::NTF_CHAT_MSG, 0, Body::Empty));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bad_magic_message_is_fatal() {
        let registry = DispatchRegistry::new();
        let mut data = net::encode(opcode::RES_SUCCESS, b"{}", 1).unwrap().to_vec();
        data[0] = 0xDE;
        data[1] = 0xAD;
        assert_eq!(
            dispatch_message(&registry, &data),
            Err(FrameError::BadMagic(0xDEAD))
        );
    }

    #[test]
    fn test_truncated_message_is_dropped() {
        let registry = DispatchRegistry::new();
        let data = net::encode(opcode::RES_SUCCESS, b"{\"a\":1}", 1).unwrap();
        assert_eq!(dispatch_message(&registry, &data[..20]), Ok(()));
    }

    #[test]
    fn test_dropping_routes_unregisters() {
        let manager = manager(CorrelationMode::Category);
        let before = manager.registry().handler_count(opcode::RES_SUCCESS);
        let routes = manager.route("register", &[opcode::RES_SUCCESS], &[]);
        assert_eq!(manager.registry().handler_count(opcode::RES_SUCCESS), before + 1);
        drop(routes);
        assert_eq!(manager.registry().handler_count(opcode::RES_SUCCESS), before);
    }
}
