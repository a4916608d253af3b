//! Error types for diagnostics
//!
//! Simple, flat error hierarchy. No over-engineering.

use gravity_bridge::BridgeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiagnosticsError>;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Not connected to browser. Call connect_browser() first.")]
    NotConnected,

    #[error("Malformed {method} response: {reason}")]
    MalformedResponse { method: String, reason: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiagnosticsError {
    /// Stable name for the failure class, reported to tool callers
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosticsError::InvalidSelector(_) => "InvalidSelector",
            DiagnosticsError::ElementNotFound(_) => "ElementNotFound",
            DiagnosticsError::NotConnected => "NotConnected",
            DiagnosticsError::MalformedResponse { .. } => "MalformedResponse",
            DiagnosticsError::Bridge(e) if e.is_timeout() => "Timeout",
            DiagnosticsError::Bridge(e) if e.is_connection_error() => "ConnectionError",
            DiagnosticsError::Bridge(_) => "CommandFailed",
            DiagnosticsError::Json(_) => "JsonError",
        }
    }
}
