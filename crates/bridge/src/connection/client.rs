//! Connection Client - the MCP side of the relay
//!
//! Design decisions:
//! 1. One WebSocket to the native host, request/response matched by ID
//! 2. No implicit connect on send. Not connected means fail fast.
//! 3. A close fails every pending request, then (optionally) schedules a
//!    single reconnect attempt after a fixed interval
//! 4. Background tasks hold `Weak` references so dropping the last handle
//!    tears everything down

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::pending::{CloseReason, Correlator};
use crate::config::BridgeOptions;
use crate::error::{BridgeError, Result};
use crate::events::{ConnectionEvent, EventBus};
use crate::protocol::Envelope;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const CLOSE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time connection report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Default)]
struct Tasks {
    reader: Option<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_socket_tasks(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(keep_alive) = self.keep_alive.take() {
            keep_alive.abort();
        }
    }
}

struct Inner {
    options: BridgeOptions,
    state: RwLock<ConnectionState>,
    correlator: Correlator,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    /// Serialises connect attempts; `disconnect` deliberately skips it
    connecting: tokio::sync::Mutex<()>,
    /// Bumped by every connect attempt and every disconnect. Socket tasks
    /// carry the value they were born with and go quiet once it moves on.
    generation: AtomicU64,
    reconnect_attempts: AtomicU32,
    tasks: Mutex<Tasks>,
    events: EventBus,
}

/// Client for the native host's WebSocket
///
/// Cheap to clone; all clones share one socket and one pending map.
#[derive(Clone)]
pub struct BrowserConnection {
    inner: Arc<Inner>,
}

impl BrowserConnection {
    pub fn new(options: BridgeOptions) -> Self {
        Self::with_event_bus(options, EventBus::new())
    }

    /// Publish lifecycle events on a bus the caller already holds, so
    /// subscriptions outlive a rebuilt connection.
    pub fn with_event_bus(options: BridgeOptions, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                state: RwLock::new(ConnectionState::Disconnected),
                correlator: Correlator::new(),
                sink: tokio::sync::Mutex::new(None),
                connecting: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                reconnect_attempts: AtomicU32::new(0),
                tasks: Mutex::new(Tasks::default()),
                events,
            }),
        }
    }

    /// Open the socket. Resolves immediately when already connected.
    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    /// Close the socket, cancel any scheduled reconnect and fail
    /// everything still pending with [`BridgeError::Disconnected`].
    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    /// Send a CDP command and wait for its response
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let call = self
            .inner
            .correlator
            .register(method, self.inner.options.timeout());
        let id = call.id();

        // On send failure `call` is dropped here, withdrawing the entry
        self.inner
            .send_envelope(&Envelope::request(id, method, params))
            .await?;
        tracing::debug!(id, method, "cdp_request sent");

        call.wait().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn status(&self) -> ConnectionStatus {
        let state = self.state();
        let message = match state {
            ConnectionState::Connected => "Connected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Disconnected => "Disconnected",
        };
        ConnectionStatus {
            connected: state == ConnectionState::Connected,
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.len()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }
}

impl Inner {
    async fn connect(self: &Arc<Self>) -> Result<()> {
        let _guard = self.connecting.lock().await;
        if *self.state.read() == ConnectionState::Connected {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tasks.lock().abort_socket_tasks();
        self.sink.lock().await.take();
        self.set_state(ConnectionState::Connecting);

        let url = self.options.url();
        let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == 1 {
            tracing::info!("Connecting to Gravity at {}...", url);
        } else {
            tracing::debug!(attempt, "Reconnecting to Gravity at {}", url);
        }

        // Dropping the handshake future on timeout closes the half-open socket
        let opened = tokio::time::timeout(self.options.timeout(), connect_async(url.as_str())).await;
        let ws = match opened {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                self.connect_failed(generation, &e.to_string());
                return Err(BridgeError::WebSocket(e));
            }
            Err(_) => {
                let err = BridgeError::ConnectTimeout {
                    timeout_ms: self.options.timeout_ms,
                };
                self.connect_failed(generation, &err.to_string());
                return Err(err);
            }
        };

        let (sink, stream) = ws.split();

        // Connected must be committed before the reader can see a close,
        // otherwise a fast close would be overwritten
        {
            let mut slot = self.sink.lock().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!("Connect attempt superseded by disconnect");
                return Err(BridgeError::Disconnected);
            }
            *slot = Some(sink);
            self.set_state(ConnectionState::Connected);
        }

        {
            // disconnect() bumps the generation before taking this lock
            let mut tasks = self.tasks.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                tracing::debug!("Connect attempt superseded by disconnect");
                return Err(BridgeError::Disconnected);
            }
            let weak = Arc::downgrade(self);
            tasks.reader = Some(tokio::spawn(read_loop(weak.clone(), stream, generation)));
            tasks.keep_alive = self
                .options
                .keep_alive()
                .map(|period| tokio::spawn(keep_alive_loop(weak, period, generation)));
        }

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        tracing::info!("Connected to Gravity");
        self.events.publish(ConnectionEvent::Connected { url });
        Ok(())
    }

    fn connect_failed(&self, generation: u64, error: &str) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.set_state(ConnectionState::Disconnected);
        }
        tracing::debug!("Connection attempt failed: {}", error);
        self.events.publish(ConnectionEvent::ConnectFailed {
            error: error.to_string(),
        });
    }

    async fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut tasks = self.tasks.lock();
            if let Some(reconnect) = tasks.reconnect.take() {
                reconnect.abort();
            }
            tasks.abort_socket_tasks();
        }

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if tokio::time::timeout(CLOSE_GRACE, sink.close()).await.is_err() {
                tracing::debug!("Close handshake did not finish in time");
            }
        }

        self.set_state(ConnectionState::Disconnected);
        self.reconnect_attempts.store(0, Ordering::SeqCst);

        let failed = self.correlator.fail_all(CloseReason::Disconnected);
        tracing::info!(failed, "Disconnected from Gravity");
        self.events.publish(ConnectionEvent::Disconnected {
            reason: "disconnect requested".to_string(),
            failed_requests: failed,
        });
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or(BridgeError::NotConnected)?;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    fn handle_message(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Failed to parse message: {}", e);
                return;
            }
        };

        match envelope {
            Envelope::CdpResponse(response) => {
                let id = response.id;
                if !self.correlator.resolve(response) {
                    // Already timed out, or never ours
                    tracing::trace!(id, "Ignoring response for settled or unknown request");
                }
            }
            Envelope::Status(fields) => tracing::debug!(?fields, "Status from native host"),
            Envelope::KeepAlive => tracing::trace!("keep-alive"),
            Envelope::CdpRequest(request) => {
                tracing::debug!(method = %request.method, "Ignoring unexpected cdp_request")
            }
        }
    }

    async fn on_socket_closed(self: &Arc<Self>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        self.set_state(ConnectionState::Disconnected);
        {
            let mut tasks = self.tasks.lock();
            // We are the reader; let the handle go without aborting ourselves
            tasks.reader.take();
            if let Some(keep_alive) = tasks.keep_alive.take() {
                keep_alive.abort();
            }
        }
        self.sink.lock().await.take();

        let failed = self.correlator.fail_all(CloseReason::ConnectionClosed);
        tracing::info!(failed, "Gravity connection closed");
        self.events.publish(ConnectionEvent::Disconnected {
            reason: "connection closed".to_string(),
            failed_requests: failed,
        });

        if self.options.auto_reconnect {
            self.schedule_reconnect();
        }
    }

    /// Arm exactly one reconnect attempt. A failed attempt re-arms itself.
    fn schedule_reconnect(self: &Arc<Self>) {
        let delay = self.options.reconnect_interval();
        let weak = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Running now; clear our own slot instead of aborting it
            inner.tasks.lock().reconnect.take();

            if let Err(e) = inner.connect().await {
                tracing::debug!("Reconnect attempt failed: {}", e);
                if inner.options.auto_reconnect && !matches!(e, BridgeError::Disconnected) {
                    inner.schedule_reconnect();
                }
            }
        });

        if let Some(previous) = self.tasks.lock().reconnect.replace(handle) {
            previous.abort();
        }
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        self.events.publish(ConnectionEvent::ReconnectScheduled {
            delay_ms: delay.as_millis() as u64,
        });
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        tasks.abort_socket_tasks();
        if let Some(reconnect) = tasks.reconnect.take() {
            reconnect.abort();
        }
    }
}

async fn read_loop(inner: Weak<Inner>, mut stream: SplitStream<WsStream>, generation: u64) {
    while let Some(message) = stream.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match message {
            Ok(Message::Text(text)) => inner.handle_message(&text),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => inner.handle_message(text),
                Err(e) => tracing::warn!("Dropping non-UTF-8 binary message: {}", e),
            },
            Ok(Message::Close(frame)) => {
                tracing::debug!(?frame, "Close frame received");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.on_socket_closed(generation).await;
    }
}

async fn keep_alive_loop(inner: Weak<Inner>, period: Duration, generation: u64) {
    let mut ticker = tokio::time::interval(period);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Err(e) = inner.send_envelope(&Envelope::KeepAlive).await {
            tracing::debug!("keep-alive send failed: {}", e);
            return;
        }
        tracing::trace!("keep-alive sent");
    }
}
