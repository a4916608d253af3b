//! Connection client and request correlation

mod client;
mod pending;

pub use client::{BrowserConnection, ConnectionState, ConnectionStatus};
pub use pending::{CloseReason, Correlator, PendingCall};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::connect_async;

use crate::error::Result;

/// Anything that can execute a CDP command and hand back its result
///
/// The diagnostics layer talks to this rather than to a socket, so it can
/// be driven by a scripted sender in tests.
#[async_trait]
pub trait CommandSender: Send + Sync {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value>;

    fn is_connected(&self) -> bool;
}

#[async_trait]
impl CommandSender for BrowserConnection {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        BrowserConnection::send_command(self, method, params).await
    }

    fn is_connected(&self) -> bool {
        BrowserConnection::is_connected(self)
    }
}

/// Check whether a native host is listening on `port`.
///
/// Opens and immediately drops a WebSocket; never touches a client's
/// state.
pub async fn probe_relay(port: u16, timeout: Duration) -> bool {
    let url = format!("ws://localhost:{}", port);
    match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
        Ok(Ok((mut ws, _))) => {
            let _ = ws.close(None).await;
            true
        }
        Ok(Err(e)) => {
            tracing::debug!("Probe of {} failed: {}", url, e);
            false
        }
        Err(_) => {
            tracing::debug!("Probe of {} timed out", url);
            false
        }
    }
}
