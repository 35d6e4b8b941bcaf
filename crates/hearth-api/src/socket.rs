//! WebSocket protocol client with request correlation and auto-reconnect.
//!
//! Owns one persistent connection to the backend's socket endpoint.
//! Performs the auth handshake, assigns correlation ids to outbound
//! commands, demultiplexes responses and push events, and reconnects
//! with exponential backoff + jitter when the connection drops.
//!
//! # Example
//!
//! ```rust,ignore
//! use hearth_api::socket::{Command, SocketClient, SocketConfig};
//! use secrecy::SecretString;
//! use url::Url;
//!
//! let url = Url::parse("ws://homeassistant.local:8123/api/websocket")?;
//! let client = SocketClient::new(SocketConfig::new(url, SecretString::from(token)));
//!
//! client.connect().await?;
//! let states = client.send(Command::new("get_states")).await?;
//! client.disconnect().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::{ArcSwap, ArcSwapOption};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Channel capacities ───────────────────────────────────────────────

const WRITE_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
///
/// Exactly one [`SocketClient`] owns this state; transitions are
/// serialized through the client's background task and published via a
/// `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Closing,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for socket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever. Default: 8.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(8),
        }
    }
}

// ── SocketConfig ─────────────────────────────────────────────────────

/// Configuration for a [`SocketClient`].
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Socket endpoint, e.g. `ws://homeassistant.local:8123/api/websocket`.
    pub url: Url,
    /// Long-lived access token presented during the handshake.
    pub access_token: SecretString,
    /// Bound on each connection + handshake attempt.
    pub connect_timeout: Duration,
    /// Backoff policy applied after an unexpected connection loss.
    pub reconnect: ReconnectConfig,
}

impl SocketConfig {
    pub fn new(url: Url, access_token: SecretString) -> Self {
        Self {
            url,
            access_token,
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── Command ──────────────────────────────────────────────────────────

/// An outbound command, before a correlation id is assigned.
///
/// The `id` and `type` fields of the wire frame are owned by the client;
/// payload fields with those names are overwritten at framing time.
#[derive(Debug, Clone)]
pub struct Command {
    command_type: String,
    payload: Map<String, Value>,
}

impl Command {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            payload: Map::new(),
        }
    }

    /// Attach one argument to the command payload.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Merge every field of a JSON object into the payload.
    /// Non-object values are ignored.
    pub fn args(mut self, object: &Value) -> Self {
        if let Some(map) = object.as_object() {
            for (key, value) in map {
                self.payload.insert(key.clone(), value.clone());
            }
        }
        self
    }

    pub fn command_type(&self) -> &str {
        &self.command_type
    }

    fn into_frame(self, id: u64) -> Value {
        let mut frame = self.payload;
        frame.insert("id".into(), Value::from(id));
        frame.insert("type".into(), Value::from(self.command_type));
        Value::Object(frame)
    }
}

// ── Wire messages ────────────────────────────────────────────────────

/// Inbound frames from the backend.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    AuthRequired {
        #[serde(default)]
        #[allow(dead_code)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<CommandError>,
    },
    Event {
        id: u64,
        event: Value,
    },
    Pong {
        id: u64,
    },
}

#[derive(Debug, Deserialize)]
struct CommandError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ── Pending request table ────────────────────────────────────────────

/// Completion slot for one in-flight command.
///
/// Removed on completion, timeout, or connection loss -- a slot never
/// outlives the connection it was issued on.
struct PendingRequest {
    issued_at: Instant,
    tx: oneshot::Sender<Result<Value, Error>>,
}

// ── SocketClient ─────────────────────────────────────────────────────

/// Handle to the persistent socket connection.
///
/// Cheaply cloneable; all clones share one connection and one
/// correlation-id space. Multiple callers may have requests in flight
/// concurrently -- dispatch order equals call order, completion order is
/// whatever the backend produces.
#[derive(Clone)]
pub struct SocketClient {
    inner: Arc<SocketShared>,
}

struct SocketShared {
    config: SocketConfig,
    state: watch::Sender<ConnectionState>,
    pending: DashMap<u64, PendingRequest>,
    subscriptions: DashMap<u64, mpsc::Sender<Arc<Value>>>,
    writer: ArcSwapOption<mpsc::Sender<Message>>,
    next_id: AtomicU64,
    cancel: ArcSwap<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketClient {
    /// Create a new client. Does NOT connect -- call
    /// [`connect()`](Self::connect) to dial and authenticate.
    pub fn new(config: SocketConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(SocketShared {
                config,
                state,
                pending: DashMap::new(),
                subscriptions: DashMap::new(),
                writer: ArcSwapOption::empty(),
                next_id: AtomicU64::new(1),
                cancel: ArcSwap::from_pointee(CancellationToken::new()),
                task: Mutex::new(None),
            }),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Establish the transport and perform the auth handshake.
    ///
    /// Transitions Disconnected → Connecting → Authenticating → Ready.
    /// Fails with [`Error::Auth`] if the backend rejects the credential,
    /// [`Error::WebSocketConnect`] if the socket cannot be established
    /// within the configured attempt window. No-op when already Ready.
    pub async fn connect(&self) -> Result<(), Error> {
        if self.is_connected() {
            return Ok(());
        }

        // A previous disconnect() leaves a cancelled token behind.
        if self.inner.cancel_token().is_cancelled() {
            self.inner.cancel.store(Arc::new(CancellationToken::new()));
        }

        let ws = match establish(&self.inner).await {
            Ok(ws) => ws,
            Err(e) => {
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let (write_tx, write_rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
        self.inner.writer.store(Some(Arc::new(write_tx)));
        self.inner.set_state(ConnectionState::Ready);

        let cancel = self.inner.cancel_token();
        let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), ws, write_rx, cancel));
        *self.inner.task.lock().await = Some(handle);

        info!("socket ready");
        Ok(())
    }

    /// Tear down the connection.
    ///
    /// Transitions to Closing, fails all pending requests with
    /// [`Error::ConnectionLost`], drops all subscriptions, and releases
    /// the transport.
    pub async fn disconnect(&self) {
        self.inner.set_state(ConnectionState::Closing);
        self.inner.cancel_token().cancel();

        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }

        self.inner.abort_in_flight();
        self.inner.set_state(ConnectionState::Disconnected);
        debug!("socket disconnected");
    }

    // ── State observation ────────────────────────────────────────────

    /// Pure state read; never touches the network.
    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.state.borrow(), ConnectionState::Ready)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a command and await its correlated response.
    ///
    /// Valid only in Ready state ([`Error::NotReady`] otherwise, never a
    /// hang). Responses are matched purely by correlation id; completion
    /// order across distinct requests is unspecified.
    pub async fn send(&self, command: Command) -> Result<Value, Error> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.request_with_id(id, command, None).await
    }

    /// Like [`send`](Self::send), with a caller-specified deadline.
    ///
    /// On expiry the pending request is removed and [`Error::Timeout`]
    /// surfaces to this caller only -- the backend-side effect of the
    /// command is not cancelled.
    pub async fn send_with_deadline(
        &self,
        command: Command,
        deadline: Duration,
    ) -> Result<Value, Error> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.request_with_id(id, command, Some(deadline)).await
    }

    /// Register a push-event listener.
    ///
    /// Events are dispatched to the returned subscription until it is
    /// unsubscribed or the connection drops. A reconnect invalidates all
    /// subscriptions -- callers must resubscribe.
    pub async fn subscribe(&self, event_type: Option<&str>) -> Result<EventSubscription, Error> {
        if !self.is_connected() {
            return Err(Error::NotReady);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        // Register before sending so no event can race past the listener.
        self.inner.subscriptions.insert(id, event_tx);

        let mut command = Command::new("subscribe_events");
        if let Some(kind) = event_type {
            command = command.arg("event_type", kind);
        }

        match self.request_with_id(id, command, None).await {
            Ok(_) => Ok(EventSubscription {
                id,
                events: event_rx,
                client: self.clone(),
            }),
            Err(e) => {
                self.inner.subscriptions.remove(&id);
                Err(e)
            }
        }
    }

    async fn request_with_id(
        &self,
        id: u64,
        command: Command,
        deadline: Option<Duration>,
    ) -> Result<Value, Error> {
        let Some(writer) = self.inner.writer.load_full() else {
            return Err(Error::NotReady);
        };
        if !self.is_connected() {
            return Err(Error::NotReady);
        }

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(
            id,
            PendingRequest {
                issued_at: Instant::now(),
                tx,
            },
        );

        let frame = command.into_frame(id);
        trace!(id, "dispatching command");
        if writer.send(Message::text(frame.to_string())).await.is_err() {
            self.inner.pending.remove(&id);
            return Err(Error::ConnectionLost);
        }

        let completed = if let Some(window) = deadline {
            match tokio::time::timeout(window, rx).await {
                Ok(done) => done,
                Err(_) => {
                    self.inner.pending.remove(&id);
                    return Err(Error::Timeout {
                        timeout_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        } else {
            rx.await
        };

        // Sender dropped without completing means the table entry was
        // destroyed by a connection teardown.
        completed.map_err(|_| Error::ConnectionLost)?
    }
}

// ── EventSubscription ────────────────────────────────────────────────

/// A live push-event stream.
pub struct EventSubscription {
    id: u64,
    events: mpsc::Receiver<Arc<Value>>,
    client: SocketClient,
}

impl EventSubscription {
    /// The subscription's correlation id on the wire.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next event. `None` once the subscription is
    /// invalidated by an unsubscribe or a connection drop.
    pub async fn next(&mut self) -> Option<Arc<Value>> {
        self.events.recv().await
    }

    /// Convert into a [`Stream`](futures_util::Stream) of events.
    ///
    /// The subscription remains registered on the backend; use
    /// [`unsubscribe`](Self::unsubscribe) for an explicit teardown.
    pub fn into_stream(self) -> ReceiverStream<Arc<Value>> {
        ReceiverStream::new(self.events)
    }

    /// Stop receiving events and tell the backend to drop the listener.
    pub async fn unsubscribe(self) -> Result<(), Error> {
        self.client.inner.subscriptions.remove(&self.id);
        let command = Command::new("unsubscribe_events").arg("subscription", self.id);
        self.client.send(command).await?;
        Ok(())
    }
}

// ── Shared state internals ───────────────────────────────────────────

impl SocketShared {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.load().as_ref().clone()
    }

    /// Fail every in-flight request and drop every subscription.
    ///
    /// Connection loss is a global event: no caller is left waiting on a
    /// dead transport.
    fn abort_in_flight(&self) {
        self.writer.store(None);

        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, slot)) = self.pending.remove(&id) {
                let _ = slot.tx.send(Err(Error::ConnectionLost));
            }
        }

        self.subscriptions.clear();
    }

    /// Route one inbound text frame to its pending request or
    /// subscription listener.
    fn dispatch_frame(&self, text: &str) {
        let message: ServerMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "unparseable frame from backend");
                return;
            }
        };

        match message {
            ServerMessage::Result {
                id,
                success,
                result,
                error,
            } => {
                let Some((_, slot)) = self.pending.remove(&id) else {
                    debug!(id, "result for unknown or timed-out request");
                    return;
                };
                trace!(
                    id,
                    success,
                    elapsed = ?slot.issued_at.elapsed(),
                    "request completed"
                );
                let outcome = if success {
                    Ok(result)
                } else {
                    let (code, message) = match error {
                        Some(e) => (e.code, e.message),
                        None => (None, None),
                    };
                    Err(Error::Api {
                        message: message.unwrap_or_else(|| "command failed".into()),
                        code,
                        status: None,
                    })
                };
                let _ = slot.tx.send(outcome);
            }

            ServerMessage::Event { id, event } => {
                let stale = if let Some(entry) = self.subscriptions.get(&id) {
                    match entry.value().try_send(Arc::new(event)) {
                        Ok(()) => false,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(id, "event listener lagging, dropping event");
                            false
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => true,
                    }
                } else {
                    trace!(id, "event for unknown subscription");
                    false
                };
                if stale {
                    self.subscriptions.remove(&id);
                }
            }

            ServerMessage::Pong { id } => {
                if let Some((_, slot)) = self.pending.remove(&id) {
                    let _ = slot.tx.send(Ok(Value::Null));
                }
            }

            ServerMessage::AuthRequired { .. }
            | ServerMessage::AuthOk { .. }
            | ServerMessage::AuthInvalid { .. } => {
                debug!("auth frame outside handshake, ignoring");
            }
        }
    }
}

// ── Connection establishment ─────────────────────────────────────────

/// Dial the endpoint and run the auth handshake to completion.
async fn establish(shared: &SocketShared) -> Result<WsStream, Error> {
    shared.set_state(ConnectionState::Connecting);
    debug!(url = %shared.config.url, "connecting to socket");

    let attempt = tokio_tungstenite::connect_async(shared.config.url.as_str());
    let (mut ws, _response) = tokio::time::timeout(shared.config.connect_timeout, attempt)
        .await
        .map_err(|_| Error::WebSocketConnect("connection attempt timed out".into()))?
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    shared.set_state(ConnectionState::Authenticating);
    tokio::time::timeout(
        shared.config.connect_timeout,
        handshake(&mut ws, &shared.config.access_token),
    )
    .await
    .map_err(|_| Error::Handshake("handshake timed out".into()))??;

    Ok(ws)
}

/// Run the credential exchange: await `auth_required`, present the
/// token, await the explicit accept/reject. No command traffic is
/// permitted before `auth_ok`.
async fn handshake(ws: &mut WsStream, token: &SecretString) -> Result<(), Error> {
    loop {
        let frame = ws
            .next()
            .await
            .ok_or_else(|| Error::Handshake("stream closed during handshake".into()))?
            .map_err(|e| Error::Handshake(e.to_string()))?;

        let Message::Text(text) = frame else { continue };

        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::AuthRequired { .. }) => {
                let auth = json!({ "type": "auth", "access_token": token.expose_secret() });
                ws.send(Message::text(auth.to_string()))
                    .await
                    .map_err(|e| Error::Handshake(e.to_string()))?;
            }
            Ok(ServerMessage::AuthOk { ha_version }) => {
                info!(
                    backend_version = ha_version.as_deref().unwrap_or("unknown"),
                    "authenticated"
                );
                return Ok(());
            }
            Ok(ServerMessage::AuthInvalid { message }) => {
                return Err(Error::Auth {
                    message: message.unwrap_or_else(|| "access token rejected".into()),
                });
            }
            Ok(_) => {
                return Err(Error::Handshake(
                    "command frame received before auth_ok".into(),
                ));
            }
            Err(e) => {
                debug!(error = %e, "ignoring unparseable handshake frame");
            }
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

enum DropReason {
    Shutdown,
    Closed,
    Failed(String),
}

/// Owns the connection for its whole life: pump frames until the
/// connection drops, then reconnect with backoff until cancelled or the
/// retry limit is reached.
async fn run_loop(
    shared: Arc<SocketShared>,
    mut ws: WsStream,
    mut write_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let reason = drive(&shared, ws, &mut write_rx, &cancel).await;

        // Connection is gone either way: fail everything in flight
        // before anything else so no caller waits on a dead transport.
        shared.abort_in_flight();

        match reason {
            DropReason::Shutdown => break,
            DropReason::Closed => info!("socket closed by backend"),
            DropReason::Failed(e) => warn!(error = %e, "socket error"),
        }
        shared.set_state(ConnectionState::Disconnected);

        // Reconnect with backoff. Subscriptions are not replayed -- the
        // caller must resubscribe once Ready again.
        loop {
            if let Some(max) = shared.config.reconnect.max_retries {
                if attempt >= max {
                    error!(max_retries = max, "reconnection limit reached, giving up");
                    return;
                }
            }

            let delay = calculate_backoff(attempt, &shared.config.reconnect);
            debug!(delay = ?delay, attempt, "waiting before reconnect");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;

            match establish(&shared).await {
                Ok(fresh) => {
                    let (write_tx, fresh_rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
                    shared.writer.store(Some(Arc::new(write_tx)));
                    ws = fresh;
                    write_rx = fresh_rx;
                    shared.set_state(ConnectionState::Ready);
                    info!(attempt, "reconnected");
                    attempt = 0;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "reconnect attempt failed");
                    shared.set_state(ConnectionState::Disconnected);
                }
            }
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    debug!("socket loop exiting");
}

/// Pump one live connection: forward queued writes in FIFO order,
/// dispatch inbound frames, until the connection ends.
async fn drive(
    shared: &SocketShared,
    ws: WsStream,
    write_rx: &mut mpsc::Receiver<Message>,
    cancel: &CancellationToken,
) -> DropReason {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return DropReason::Shutdown;
            }
            outbound = write_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            return DropReason::Failed(e.to_string());
                        }
                    }
                    // Writer handle dropped -- client is shutting down.
                    None => return DropReason::Shutdown,
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => shared.dispatch_frame(&text),
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        trace!("socket ping");
                    }
                    Some(Ok(Message::Close(_))) => return DropReason::Closed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return DropReason::Failed(e.to_string()),
                    None => return DropReason::Closed,
                }
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple
/// clients, derived deterministically from the attempt number.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config_is_bounded() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_retries, Some(8));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn command_frame_carries_id_and_type() {
        let frame = Command::new("get_states").into_frame(42);
        assert_eq!(frame["id"], 42);
        assert_eq!(frame["type"], "get_states");
    }

    #[test]
    fn command_payload_cannot_shadow_id_or_type() {
        let frame = Command::new("ping")
            .arg("id", 999)
            .arg("type", "spoofed")
            .into_frame(7);
        assert_eq!(frame["id"], 7);
        assert_eq!(frame["type"], "ping");
    }

    #[test]
    fn command_args_merges_object_fields() {
        let extra = json!({ "event_type": "state_changed", "nested": { "a": 1 } });
        let frame = Command::new("subscribe_events").args(&extra).into_frame(3);
        assert_eq!(frame["event_type"], "state_changed");
        assert_eq!(frame["nested"]["a"], 1);
    }

    #[test]
    fn parse_result_frame() {
        let raw = r#"{ "id": 5, "type": "result", "success": true, "result": {"ok": 1} }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Result {
                id,
                success,
                result,
                error,
            } => {
                assert_eq!(id, 5);
                assert!(success);
                assert_eq!(result["ok"], 1);
                assert!(error.is_none());
            }
            other => panic!("expected result frame, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_result_frame() {
        let raw = r#"{
            "id": 6, "type": "result", "success": false,
            "error": { "code": "not_found", "message": "no such automation" }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Result { success, error, .. } => {
                assert!(!success);
                let error = error.unwrap();
                assert_eq!(error.code.as_deref(), Some("not_found"));
                assert_eq!(error.message.as_deref(), Some("no such automation"));
            }
            other => panic!("expected result frame, got {other:?}"),
        }
    }

    #[test]
    fn parse_event_frame() {
        let raw = r#"{ "id": 9, "type": "event", "event": { "event_type": "state_changed" } }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Event { id, event } => {
                assert_eq!(id, 9);
                assert_eq!(event["event_type"], "state_changed");
            }
            other => panic!("expected event frame, got {other:?}"),
        }
    }

    #[test]
    fn parse_auth_frames() {
        let required: ServerMessage =
            serde_json::from_str(r#"{ "type": "auth_required", "ha_version": "2025.1" }"#).unwrap();
        assert!(matches!(required, ServerMessage::AuthRequired { .. }));

        let invalid: ServerMessage =
            serde_json::from_str(r#"{ "type": "auth_invalid", "message": "bad token" }"#).unwrap();
        match invalid {
            ServerMessage::AuthInvalid { message } => {
                assert_eq!(message.as_deref(), Some("bad token"));
            }
            other => panic!("expected auth_invalid, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_completes_pending_by_id() {
        let client = SocketClient::new(SocketConfig::new(
            Url::parse("ws://127.0.0.1:1/api/websocket").unwrap(),
            SecretString::from("token".to_owned()),
        ));

        let (tx, rx) = oneshot::channel();
        client.inner.pending.insert(
            11,
            PendingRequest {
                issued_at: Instant::now(),
                tx,
            },
        );

        client
            .inner
            .dispatch_frame(r#"{ "id": 11, "type": "result", "success": true, "result": 5 }"#);

        let outcome = rx.blocking_recv().unwrap().unwrap();
        assert_eq!(outcome, 5);
        assert!(client.inner.pending.is_empty());
    }

    #[test]
    fn abort_in_flight_fails_every_pending() {
        let client = SocketClient::new(SocketConfig::new(
            Url::parse("ws://127.0.0.1:1/api/websocket").unwrap(),
            SecretString::from("token".to_owned()),
        ));

        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        client.inner.pending.insert(
            1,
            PendingRequest {
                issued_at: Instant::now(),
                tx: tx_a,
            },
        );
        client.inner.pending.insert(
            2,
            PendingRequest {
                issued_at: Instant::now(),
                tx: tx_b,
            },
        );

        client.inner.abort_in_flight();

        assert!(matches!(
            rx_a.blocking_recv().unwrap(),
            Err(Error::ConnectionLost)
        ));
        assert!(matches!(
            rx_b.blocking_recv().unwrap(),
            Err(Error::ConnectionLost)
        ));
    }
}
