//! Relay Server - stdio <-> WebSocket
//!
//! One upstream peer (the extension, speaking length-prefixed frames over a
//! byte stream) and at most one downstream peer (an MCP client on a
//! WebSocket). Messages are forwarded as-is in both directions.
//!
//! Routing rules:
//! - Last client wins. A new client takes the forwarding slot; the old one
//!   stays open but stops receiving.
//! - No peer, no delivery. Upstream messages with nobody downstream are
//!   dropped, never queued.
//! - A bad message costs only itself. A bad length prefix ends the relay.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::{decode_json, encode_json, FrameError, NativeFrameCodec};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::Envelope;

const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Why [`RelayServer::run`] returned normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The upstream byte stream reached end-of-file
    UpstreamClosed,
    /// The shutdown future completed
    Shutdown,
}

pub struct RelayServer {
    listener: TcpListener,
    config: RelayConfig,
}

impl RelayServer {
    /// Bind the listening socket. An occupied port is fatal; there is no
    /// fallback port.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.clone(),
                source,
            })?;
        tracing::info!("[Native Host] WebSocket server listening on {}", addr);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Relay until upstream EOF or `shutdown`. A bad length prefix or a
    /// failed write to the upstream peer is fatal.
    pub async fn run<R, W, S>(
        self,
        upstream_in: R,
        upstream_out: W,
        shutdown: S,
    ) -> Result<RelayExit, RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let RelayServer { listener, config } = self;
        let slot = DownstreamSlot::default();

        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel::<Bytes>();
        let mut writer = tokio::spawn(write_upstream(
            FramedWrite::new(upstream_out, NativeFrameCodec::with_max_len(config.max_frame_len)),
            upstream_rx,
        ));
        let acceptor = tokio::spawn(accept_loop(
            listener,
            slot.clone(),
            upstream_tx.clone(),
            config.announce_status,
        ));

        let mut frames = FramedRead::new(
            upstream_in,
            NativeFrameCodec::with_max_len(config.max_frame_len),
        );
        tokio::pin!(shutdown);
        let mut writer_done = false;

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("[Native Host] Shutdown requested");
                    break Ok(RelayExit::Shutdown);
                }
                frame = frames.next() => match frame {
                    Some(Ok(payload)) => forward_downstream(&slot, &payload),
                    Some(Err(e)) => {
                        tracing::error!("[Native Host] Fatal framing error: {}", e);
                        break Err(RelayError::Frame(e));
                    }
                    None => {
                        tracing::info!("[Native Host] stdin closed, shutting down");
                        break Ok(RelayExit::UpstreamClosed);
                    }
                },
                joined = &mut writer, if !writer_done => {
                    writer_done = true;
                    match joined {
                        Ok(Err(e)) => break Err(e),
                        Ok(Ok(())) => {}
                        Err(e) => tracing::error!("[Native Host] Upstream writer task failed: {}", e),
                    }
                }
            }
        };

        // Stops accepting and drops every downstream handler with it
        acceptor.abort();
        slot.close();
        drop(upstream_tx);
        if !writer_done && tokio::time::timeout(FLUSH_GRACE, writer).await.is_err() {
            tracing::debug!("Upstream writer did not drain in time");
        }

        outcome
    }
}

async fn write_upstream<W>(
    mut frames: FramedWrite<W, NativeFrameCodec>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = rx.recv().await {
        match frames.send(payload).await {
            Ok(()) => {}
            Err(e @ (FrameError::TooLarge { .. } | FrameError::InvalidLength(_))) => {
                tracing::warn!("[Native Host] Dropping message for extension: {}", e);
            }
            Err(FrameError::Io(e)) => {
                tracing::error!("[Native Host] Failed to write to extension: {}", e);
                return Err(RelayError::Io(e));
            }
            Err(e) => {
                tracing::error!("[Native Host] Failed to write to extension: {}", e);
                return Err(RelayError::Frame(e));
            }
        }
    }
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    slot: DownstreamSlot,
    upstream: mpsc::UnboundedSender<Bytes>,
    announce: bool,
) {
    // Owned here so aborting this task tears every handler down too
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    handlers.spawn(serve_downstream(
                        stream,
                        peer,
                        slot.clone(),
                        upstream.clone(),
                        announce,
                    ));
                }
                Err(e) => {
                    tracing::warn!("[Native Host] Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        tracing::error!("[Native Host] Client handler panicked: {}", e);
                    }
                }
            }
        }
    }
}

async fn serve_downstream(
    stream: TcpStream,
    peer: SocketAddr,
    slot: DownstreamSlot,
    upstream: mpsc::UnboundedSender<Bytes>,
    announce: bool,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(%peer, "[Native Host] WebSocket handshake failed: {}", e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client = slot.install(tx);
    tracing::info!(%peer, client, "[Native Host] MCP client connected");
    if announce {
        announce_status(&upstream, true, "MCP client connected");
    }

    // Ends when the slot lets go of `tx`; the socket itself is left alone
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sink.send(message).await {
                tracing::debug!("[Native Host] Send to MCP client failed: {}", e);
                break;
            }
        }
    });

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => forward_upstream(&upstream, text.as_bytes()),
            Ok(Message::Binary(bytes)) => forward_upstream(&upstream, &bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(client, "[Native Host] WebSocket error: {}", e);
                break;
            }
        }
    }

    if slot.release(client) {
        tracing::info!(client, "[Native Host] MCP client disconnected");
        if announce {
            announce_status(&upstream, false, "MCP client disconnected");
        }
    } else {
        tracing::debug!(client, "[Native Host] Superseded MCP client disconnected");
    }
    writer.abort();
}

/// Extension -> MCP
fn forward_downstream(slot: &DownstreamSlot, payload: &[u8]) {
    let message: Value = match decode_json(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("[Native Host] Failed to parse message from extension: {}", e);
            return;
        }
    };

    let kind = message.get("type").and_then(Value::as_str).unwrap_or("unknown");
    if slot.forward(message.to_string()) {
        tracing::debug!(kind, "[Native Host] Extension → MCP");
    } else {
        tracing::info!(kind, "[Native Host] No MCP client connected, message dropped");
    }
}

/// MCP -> Extension
fn forward_upstream(upstream: &mpsc::UnboundedSender<Bytes>, text: &[u8]) {
    let message: Value = match decode_json(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("[Native Host] Failed to parse message from MCP client: {}", e);
            return;
        }
    };

    match encode_json(&message) {
        Ok(payload) => {
            let kind = message.get("type").and_then(Value::as_str).unwrap_or("unknown");
            tracing::debug!(kind, "[Native Host] MCP → Extension");
            if upstream.send(payload).is_err() {
                tracing::debug!("[Native Host] Upstream writer gone, message dropped");
            }
        }
        Err(e) => tracing::warn!("[Native Host] Failed to encode message: {}", e),
    }
}

fn announce_status(upstream: &mpsc::UnboundedSender<Bytes>, connected: bool, message: &str) {
    match encode_json(&Envelope::status(connected, message)) {
        Ok(payload) => {
            let _ = upstream.send(payload);
        }
        Err(e) => tracing::warn!("[Native Host] Failed to encode status: {}", e),
    }
}

struct Downstream {
    id: u64,
    tx: mpsc::UnboundedSender<Message>,
}

/// The single forwarding reference, owned by whichever client came last
#[derive(Clone, Default)]
struct DownstreamSlot {
    current: Arc<Mutex<Option<Downstream>>>,
    next_id: Arc<AtomicU64>,
}

impl DownstreamSlot {
    fn install(&self, tx: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self.current.lock().replace(Downstream { id, tx });
        if let Some(previous) = previous {
            tracing::info!(
                previous = previous.id,
                current = id,
                "[Native Host] New MCP client replaces the previous one"
            );
        }
        id
    }

    /// Give up the slot, but only if `id` still owns it
    fn release(&self, id: u64) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(downstream) if downstream.id == id => {
                current.take();
                true
            }
            _ => false,
        }
    }

    /// Hand `text` to the current client's writer; false when nobody is
    /// there to take it
    fn forward(&self, text: String) -> bool {
        match self.current.lock().as_ref() {
            Some(downstream) => downstream.tx.send(Message::Text(text)).is_ok(),
            None => false,
        }
    }

    fn close(&self) {
        if let Some(downstream) = self.current.lock().take() {
            let _ = downstream.tx.send(Message::Close(None));
        }
    }

    #[cfg(test)]
    fn owner(&self) -> Option<u64> {
        self.current.lock().as_ref().map(|downstream| downstream.id)
    }
}
