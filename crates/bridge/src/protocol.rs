//! Wire envelope types
//!
//! The same JSON shape travels over both legs of the bridge: length-prefixed
//! frames on the extension's stdio, text frames on the WebSocket. Only the
//! framing differs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request ID - monotonically increasing, never reused by a client
pub type RequestId = u64;

/// One message on the wire, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "cdp_request")]
    CdpRequest(CdpRequest),

    #[serde(rename = "cdp_response")]
    CdpResponse(CdpResponse),

    /// Informational, never correlated
    #[serde(rename = "status")]
    Status(Map<String, Value>),

    /// Side-channel traffic that keeps the upstream transport from idling out
    #[serde(rename = "keep-alive")]
    KeepAlive,
}

impl Envelope {
    pub fn request(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Envelope::CdpRequest(CdpRequest {
            id,
            method: method.into(),
            params,
        })
    }

    pub fn status(connected: bool, message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("connected".to_string(), Value::Bool(connected));
        fields.insert("message".to_string(), Value::String(message.into()));
        Envelope::Status(fields)
    }

    /// Wire tag, handy for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::CdpRequest(_) => "cdp_request",
            Envelope::CdpResponse(_) => "cdp_response",
            Envelope::Status(_) => "status",
            Envelope::KeepAlive => "keep-alive",
        }
    }
}

/// CDP command forwarded to the extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdpRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Reply to a [`CdpRequest`]; `result` and `error` are mutually exclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdpResponse {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl CdpResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ResponseError {
                message: message.into(),
            }),
        }
    }

    /// Split into the payload or the peer's error message.
    ///
    /// An `error` object wins over any `result`; an empty message is
    /// reported as `"Command failed"`. A response carrying neither field
    /// resolves to `null`.
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(error) if error.message.is_empty() => Err("Command failed".to_string()),
            Some(error) => Err(error.message),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Error body of a failed [`CdpResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let envelope = Envelope::request(7, "DOM.querySelector", json!({"selector": "#modal"}));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "cdp_request",
                "id": 7,
                "method": "DOM.querySelector",
                "params": {"selector": "#modal"}
            })
        );
    }

    #[test]
    fn test_parse_success_response() {
        let text = r#"{"type":"cdp_response","id":1,"result":{"nodeId":42}}"#;
        let envelope: Envelope = serde_json::from_str(text).unwrap();

        match envelope {
            Envelope::CdpResponse(response) => {
                assert_eq!(response.id, 1);
                assert_eq!(response.into_result(), Ok(json!({"nodeId": 42})));
            }
            other => panic!("Expected cdp_response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let text = r#"{"type":"cdp_response","id":3,"error":{"message":"Debugger not attached"}}"#;
        let envelope: Envelope = serde_json::from_str(text).unwrap();

        let Envelope::CdpResponse(response) = envelope else {
            panic!("Expected cdp_response");
        };
        assert_eq!(
            response.into_result(),
            Err("Debugger not attached".to_string())
        );
    }

    #[test]
    fn test_error_without_message_falls_back() {
        let text = r#"{"type":"cdp_response","id":3,"error":{}}"#;
        let Envelope::CdpResponse(response) = serde_json::from_str(text).unwrap() else {
            panic!("Expected cdp_response");
        };
        assert_eq!(response.into_result(), Err("Command failed".to_string()));
    }

    #[test]
    fn test_response_without_payload_is_null() {
        let response: CdpResponse = serde_json::from_str(r#"{"id":9}"#).unwrap();
        assert_eq!(response.into_result(), Ok(Value::Null));
    }

    #[test]
    fn test_keep_alive_and_status() {
        let keep_alive: Envelope = serde_json::from_str(r#"{"type":"keep-alive"}"#).unwrap();
        assert_eq!(keep_alive, Envelope::KeepAlive);
        assert_eq!(
            serde_json::to_string(&keep_alive).unwrap(),
            r#"{"type":"keep-alive"}"#
        );

        let status: Envelope =
            serde_json::from_str(r#"{"type":"status","connected":true,"tabId":5}"#).unwrap();
        match status {
            Envelope::Status(fields) => {
                assert_eq!(fields.get("connected"), Some(&json!(true)));
                assert_eq!(fields.get("tabId"), Some(&json!(5)));
                assert!(!fields.contains_key("type"));
            }
            other => panic!("Expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<Envelope>(r#"{"type":"bogus","id":1}"#);
        assert!(result.is_err());
    }
}
