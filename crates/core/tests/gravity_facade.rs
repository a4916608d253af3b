//! Gravity against a fake native host that plays the extension's part

use futures_util::{SinkExt, StreamExt};
use gravity_bridge::BridgeOptions;
use gravity_core::{DiagnosticsError, Gravity, IssueKind};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// A page with one fixed, z-index-less modal hanging off the right edge
fn answer(method: &str, params: &Value) -> Value {
    match method {
        "DOM.getDocument" => json!({"result": {"root": {"nodeId": 1}}}),
        "DOM.querySelector" if params["selector"] == "#modal" => json!({"result": {"nodeId": 9}}),
        "DOM.querySelector" => json!({"result": {"nodeId": 0}}),
        "DOM.getBoxModel" => json!({"result": {"model": {
            "content": [900, 50, 1100, 50, 1100, 450, 900, 450],
            "width": 200,
            "height": 400
        }}}),
        "Page.getLayoutMetrics" => json!({"result": {"layoutViewport": {"clientWidth": 1024, "clientHeight": 768}}}),
        "CSS.getComputedStyleForNode" => json!({"result": {"computedStyle": [
            {"name": "display", "value": "block"},
            {"name": "position", "value": "fixed"},
            {"name": "z-index", "value": "auto"}
        ]}}),
        _ => json!({"error": {"message": format!("'{}' wasn't found", method)}}),
    }
}

async fn spawn_fake_host() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(Message::Text(text))) = ws.next().await {
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let mut reply = answer(request["method"].as_str().unwrap_or(""), &request["params"]);
                    reply["type"] = json!("cdp_response");
                    reply["id"] = request["id"].clone();
                    if ws.send(Message::Text(reply.to_string())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    port
}

fn options(port: u16) -> BridgeOptions {
    BridgeOptions {
        host: "127.0.0.1".to_string(),
        port,
        timeout_ms: 2_000,
        auto_reconnect: false,
        ..BridgeOptions::default()
    }
}

#[tokio::test]
async fn test_diagnose_modal_end_to_end() {
    let port = spawn_fake_host().await;
    let mut gravity = Gravity::new(options(port));

    gravity.connect_browser(None).await.unwrap();
    assert!(gravity.is_connected());

    let report = gravity.diagnose_layout("#modal").await.unwrap();

    assert_eq!(report.position.right, 1100);
    assert_eq!(report.viewport.width, 1024);
    let kinds: Vec<_> = report.issues.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![IssueKind::OffscreenRight, IssueKind::ModalNoZindex]);
    assert_eq!(report.issues[0].pixels, Some(76));
    assert_eq!(report.summary.high_severity, 1);

    gravity.disconnect_browser().await;
    assert!(!gravity.is_connected());
}

#[tokio::test]
async fn test_missing_element_end_to_end() {
    let port = spawn_fake_host().await;
    let mut gravity = Gravity::new(options(port));
    gravity.connect_browser(None).await.unwrap();

    let err = gravity.diagnose_layout("#nope").await.unwrap_err();
    assert!(matches!(err, DiagnosticsError::ElementNotFound(_)));
}

#[tokio::test]
async fn test_connect_on_explicit_port() {
    let port = spawn_fake_host().await;
    // Start pointed somewhere else, then switch
    let mut gravity = Gravity::new(options(1));

    gravity.connect_browser(Some(port)).await.unwrap();
    assert!(gravity.status().connected);
    assert_eq!(gravity.status().message, "Connected");
}
