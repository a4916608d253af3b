//! The tools Gravity exposes over MCP.

use gravity_core::Gravity;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ToolError;

const DEFAULT_HIGHLIGHT_COLOR: &str = "red";
const DEFAULT_HIGHLIGHT_MS: u64 = 3000;

/// Tool definitions as returned by `tools/list`.
pub fn definitions() -> Value {
    json!([
        {
            "name": "diagnose_layout",
            "description": "Diagnose CSS layout issues for a DOM element",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "selector": {
                        "type": "string",
                        "description": "CSS selector for the element to diagnose (e.g., \"#modal\", \".button\")"
                    }
                },
                "required": ["selector"]
            }
        },
        {
            "name": "check_connection",
            "description": "Check if browser is connected",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        },
        {
            "name": "highlight_element",
            "description": "Highlight an element in the browser",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "selector": {
                        "type": "string",
                        "description": "CSS selector for the element to highlight"
                    },
                    "color": {
                        "type": "string",
                        "description": "Color for the highlight (default: red)"
                    },
                    "duration": {
                        "type": "number",
                        "description": "Duration in milliseconds (default: 3000)"
                    }
                },
                "required": ["selector"]
            }
        }
    ])
}

#[derive(Debug, Deserialize)]
struct DiagnoseArgs {
    selector: String,
}

#[derive(Debug, Deserialize)]
struct HighlightArgs {
    selector: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    // Absent arguments behave like an empty object
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Run one tool and return its JSON result.
pub async fn call_tool(gravity: &Gravity, name: &str, arguments: Value) -> Result<Value, ToolError> {
    match name {
        "diagnose_layout" => {
            let args: DiagnoseArgs = parse_args(name, arguments)?;
            if !gravity.is_connected() {
                return Err(ToolError::NotConnected);
            }
            let report = gravity.diagnose_layout(&args.selector).await?;
            Ok(serde_json::to_value(report)?)
        }

        "check_connection" => Ok(serde_json::to_value(gravity.status())?),

        "highlight_element" => {
            let args: HighlightArgs = parse_args(name, arguments)?;
            if !gravity.is_connected() {
                return Err(ToolError::NotConnected);
            }
            // Acknowledged only; the extension has no highlight command yet
            let color = args.color.as_deref().unwrap_or(DEFAULT_HIGHLIGHT_COLOR);
            let duration = args.duration.unwrap_or(DEFAULT_HIGHLIGHT_MS);
            tracing::debug!(selector = %args.selector, color, duration, "Highlight requested");
            Ok(json!({
                "success": true,
                "message": format!("Highlight request sent for {}", args.selector),
                "color": color,
                "duration": duration,
            }))
        }

        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravity_bridge::BridgeOptions;

    fn offline() -> Gravity {
        Gravity::new(BridgeOptions {
            host: "127.0.0.1".to_string(),
            port: 1,
            auto_reconnect: false,
            ..BridgeOptions::default()
        })
    }

    #[test]
    fn test_lists_three_tools() {
        let tools = definitions();
        let names: Vec<_> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["diagnose_layout", "check_connection", "highlight_element"]);
    }

    #[tokio::test]
    async fn test_check_connection_reports_status() {
        let result = call_tool(&offline(), "check_connection", Value::Null).await.unwrap();
        assert_eq!(result["connected"], false);
        assert_eq!(result["message"], "Disconnected");
        assert!(result["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_arguments_checked_before_connection() {
        let err = call_tool(&offline(), "diagnose_layout", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = call_tool(&offline(), "diagnose_layout", json!({"selector": "#modal"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConnected));
    }

    #[tokio::test]
    async fn test_highlight_requires_connection() {
        let err = call_tool(&offline(), "highlight_element", json!({"selector": "#modal"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotConnected));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = call_tool(&offline(), "resize_window", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: resize_window");
    }
}
