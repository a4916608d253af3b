//! MCP server over newline-delimited JSON-RPC.
//!
//! stdout is the protocol channel: one response per line, nothing else.
//! Diagnostics go through `tracing` to stderr.

use std::future::Future;

use gravity_core::Gravity;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::jsonrpc::{INVALID_PARAMS, INVALID_REQUEST, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::tools;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "gravity";

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct McpServer {
    gravity: Gravity,
}

impl McpServer {
    pub fn new(gravity: Gravity) -> Self {
        Self { gravity }
    }

    pub fn gravity(&self) -> &Gravity {
        &self.gravity
    }

    /// Dispatch one request. `None` for notifications.
    pub async fn process_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => self.call_tool(request.params).await,
            other => {
                tracing::debug!(method = other, "Method not found");
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;

        tracing::info!(tool = %params.name, "Tool call");
        match tools::call_tool(&self.gravity, &params.name, params.arguments).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
                Ok(json!({ "content": [{ "type": "text", "text": text }] }))
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, "Tool failed: {}", e);
                Err(e.to_rpc_error())
            }
        }
    }

    /// Handle one input line, returning the serialised response if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => {
                tracing::warn!("Error processing request: {}", e);
                Some(JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error()))
            }
            Ok(value) => {
                let id = value.get("id").cloned();
                match serde_json::from_value::<JsonRpcRequest>(value) {
                    Ok(request) => self.process_request(request).await,
                    // Malformed notifications are dropped like any other notification
                    Err(e) => id.map(|id| {
                        tracing::warn!("Invalid request: {}", e);
                        JsonRpcResponse::failure(id, JsonRpcError::new(INVALID_REQUEST, "Invalid Request"))
                    }),
                }
            }
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!("Failed to serialise response: {}", e);
                None
            }
        }
    }

    /// Serve until EOF on `reader` or until `shutdown` completes.
    pub async fn serve<R, W, S>(&self, reader: R, mut writer: W, shutdown: S) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let mut lines = reader.lines();
        tokio::pin!(shutdown);

        loop {
            let line = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                tracing::info!("stdin closed");
                break;
            };

            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravity_bridge::BridgeOptions;
    use tokio::io::BufReader;

    fn server() -> McpServer {
        McpServer::new(Gravity::new(BridgeOptions {
            host: "127.0.0.1".to_string(),
            port: 1,
            auto_reconnect: false,
            ..BridgeOptions::default()
        }))
    }

    async fn exchange(line: &str) -> Option<Value> {
        server()
            .handle_line(line)
            .await
            .map(|text| serde_json::from_str(&text).unwrap())
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let resp = exchange(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(resp["result"]["serverInfo"]["name"], "gravity");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let resp = exchange(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(resp["id"], "a");
        assert_eq!(resp["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tool_results_are_text_content() {
        let resp = exchange(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"check_connection","arguments":{}}}"#,
        )
        .await
        .unwrap();
        let content = &resp["result"]["content"][0];
        assert_eq!(content["type"], "text");
        let status: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(status["connected"], false);
    }

    #[tokio::test]
    async fn test_tool_failure_is_internal_error_with_type() {
        let resp = exchange(
            r##"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"diagnose_layout","arguments":{"selector":"#modal"}}}"##,
        )
        .await
        .unwrap();
        assert_eq!(resp["error"]["code"], -32603);
        assert_eq!(resp["error"]["data"]["type"], "NotConnected");
        assert!(resp["error"]["message"].as_str().unwrap().starts_with("Not connected to browser"));
    }

    #[tokio::test]
    async fn test_bad_tool_arguments_are_invalid_params() {
        let resp = exchange(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"diagnose_layout","arguments":{"selector":7}}}"#,
        )
        .await
        .unwrap();
        assert_eq!(resp["error"]["code"], -32602);

        let resp = exchange(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call"}"#)
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = exchange(r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], -32601);
        assert_eq!(resp["error"]["message"], "Method not found");
    }

    #[tokio::test]
    async fn test_unparsable_line_gets_parse_error() {
        let resp = exchange("{not json").await.unwrap();
        assert!(resp["id"].is_null());
        assert_eq!(resp["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_notifications_and_blank_lines_get_no_response() {
        assert!(exchange(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await.is_none());
        assert!(exchange("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_serve_writes_one_line_per_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();

        server()
            .serve(BufReader::new(input.as_bytes()), &mut output, std::future::pending())
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let ids: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
    }
}
