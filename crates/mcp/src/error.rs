use gravity_core::DiagnosticsError;
use serde_json::json;
use thiserror::Error;

use crate::jsonrpc::{INTERNAL_ERROR, INVALID_PARAMS, JsonRpcError};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(
        "Not connected to browser. Make sure the Gravity extension is loaded and you clicked \"Connect to Tab\"."
    )]
    NotConnected,

    #[error(transparent)]
    Diagnostics(#[from] DiagnosticsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "UnknownTool",
            ToolError::InvalidArguments { .. } => "InvalidArguments",
            ToolError::NotConnected => "NotConnected",
            ToolError::Diagnostics(e) => e.kind(),
            ToolError::Json(_) => "JsonError",
        }
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        let code = match self {
            ToolError::InvalidArguments { .. } => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        };
        JsonRpcError::new(code, self.to_string()).with_data(json!({ "type": self.kind() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_map_to_invalid_params() {
        let err = ToolError::InvalidArguments {
            tool: "diagnose_layout".into(),
            reason: "missing field `selector`".into(),
        };
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32602);
        assert_eq!(rpc.data.unwrap()["type"], "InvalidArguments");
    }

    #[test]
    fn test_engine_failures_keep_their_kind() {
        let err = ToolError::from(DiagnosticsError::ElementNotFound("#x".into()));
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32603);
        assert_eq!(rpc.message, "Element not found: #x");
        assert_eq!(rpc.data.unwrap()["type"], "ElementNotFound");
    }
}
