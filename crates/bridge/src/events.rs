//! Event Bus - connection lifecycle notifications
//!
//! Design: Type-safe events over a broadcast channel.
//! Publishing never blocks and never fails when nobody is listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Connection lifecycle events emitted by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    Connected { url: String },
    ConnectFailed { error: String },
    Disconnected { reason: String, failed_requests: usize },
    ReconnectScheduled { delay_ms: u64 },
}

/// Simple event bus using tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ConnectionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: ConnectionEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
