//! Request Correlator
//!
//! Every outbound request gets a fresh id and a pending entry. The entry is
//! settled by exactly one of: the matching response, its timeout, or the
//! connection going away. Whoever removes the entry from the map wins;
//! everyone else finds nothing and backs off. That removal is the only
//! synchronisation point.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{BridgeError, Result};
use crate::protocol::{CdpResponse, RequestId};

/// Why a batch of pending requests was failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Socket went away underneath us
    ConnectionClosed,
    /// Owner asked to disconnect
    Disconnected,
}

/// Single committed result of one request
#[derive(Debug)]
enum Outcome {
    Response(CdpResponse),
    TimedOut,
    Closed(CloseReason),
}

struct Pending {
    method: String,
    tx: oneshot::Sender<Outcome>,
    timer: Option<AbortHandle>,
}

/// Registry of in-flight requests keyed by id
#[derive(Clone)]
pub struct Correlator {
    next_id: Arc<AtomicU64>,
    pending: Arc<DashMap<RequestId, Pending>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Allocate the next id and start its timeout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, method: &str, timeout: Duration) -> PendingCall {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            Pending {
                method: method.to_string(),
                tx,
                timer: None,
            },
        );

        // Entry goes in before the timer exists, so even a zero timeout
        // finds something to settle.
        let correlator = self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            correlator.settle(id, Outcome::TimedOut);
        })
        .abort_handle();

        match self.pending.get_mut(&id) {
            Some(mut entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }

        PendingCall {
            id,
            method: method.to_string(),
            timeout,
            rx,
            correlator: self.clone(),
        }
    }

    /// Deliver a response. Returns false when the id is unknown or was
    /// already settled by a timeout or close.
    pub fn resolve(&self, response: CdpResponse) -> bool {
        let id = response.id;
        self.settle(id, Outcome::Response(response))
    }

    /// Fail every in-flight request, returning how many were failed
    pub fn fail_all(&self, reason: CloseReason) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.settle(*id, Outcome::Closed(reason)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn settle(&self, id: RequestId, outcome: Outcome) -> bool {
        let Some((_, pending)) = self.pending.remove(&id) else {
            return false;
        };

        if let Some(timer) = pending.timer {
            // The timer settling its own entry must not cancel itself
            if !matches!(outcome, Outcome::TimedOut) {
                timer.abort();
            }
        }

        match &outcome {
            Outcome::TimedOut => tracing::debug!(id, method = %pending.method, "request timed out"),
            Outcome::Closed(reason) => {
                tracing::debug!(id, method = %pending.method, ?reason, "request failed by close")
            }
            Outcome::Response(_) => tracing::trace!(id, method = %pending.method, "response matched"),
        }

        // The waiter may have been dropped; nothing left to tell it
        let _ = pending.tx.send(outcome);
        true
    }

    /// Drop an entry without notifying anyone
    fn forget(&self, id: RequestId) {
        if let Some((_, pending)) = self.pending.remove(&id) {
            if let Some(timer) = pending.timer {
                timer.abort();
            }
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one in-flight request
///
/// Dropping it before completion withdraws the request locally; the
/// command already sent upstream cannot be recalled and its late reply is
/// ignored.
pub struct PendingCall {
    id: RequestId,
    method: String,
    timeout: Duration,
    rx: oneshot::Receiver<Outcome>,
    correlator: Correlator,
}

impl PendingCall {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the committed outcome
    pub async fn wait(mut self) -> Result<Value> {
        match (&mut self.rx).await {
            Ok(Outcome::Response(response)) => {
                response.into_result().map_err(BridgeError::CommandFailed)
            }
            Ok(Outcome::TimedOut) => Err(BridgeError::Timeout {
                method: self.method.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Ok(Outcome::Closed(CloseReason::ConnectionClosed)) => Err(BridgeError::ConnectionClosed),
            Ok(Outcome::Closed(CloseReason::Disconnected)) => Err(BridgeError::Disconnected),
            // Sender vanished without settling: the registry itself is gone
            Err(_) => Err(BridgeError::ConnectionClosed),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.correlator.forget(self.id);
    }
}
