//! Errors surfaced to callers of the connection client
//!
//! The first six variants are what a `send_command` caller pattern-matches
//! on; their messages stay textually distinct from each other.

use thiserror::Error;

use crate::codec::FrameError;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Not connected to Gravity")]
    NotConnected,

    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    #[error("Command {method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// Error reported by the extension, message passed through verbatim
    #[error("{0}")]
    CommandFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Disconnected")]
    Disconnected,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout { .. } | BridgeError::ConnectTimeout { .. }
        )
    }

    /// True for failures that affect the whole connection rather than one call
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BridgeError::NotConnected
                | BridgeError::ConnectionClosed
                | BridgeError::Disconnected
                | BridgeError::WebSocket(_)
        )
    }
}

/// Errors that stop the relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Upstream framing is unrecoverable once a length prefix is bad
    #[error("Upstream framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
