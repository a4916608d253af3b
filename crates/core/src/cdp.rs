//! Typed wrappers over the handful of CDP commands diagnostics needs
//!
//! Each helper sends one command through a [`CommandSender`] and parses
//! only the fields it uses. Anything missing or mistyped becomes
//! [`DiagnosticsError::MalformedResponse`] naming the command.

use ahash::AHashMap;
use gravity_bridge::CommandSender;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{DiagnosticsError, Result};

/// CDP DOM node id. `0` means "no node".
pub type NodeId = i64;

/// Computed style, property name -> value
pub type StyleMap = AHashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoxModel {
    /// Content quad: x1,y1 .. x4,y4 clockwise from top-left
    pub content: Vec<f64>,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutViewport {
    pub client_width: f64,
    pub client_height: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRef {
    node_id: NodeId,
}

#[derive(Deserialize)]
struct DocumentResult {
    root: NodeRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuerySelectorResult {
    #[serde(default)]
    node_id: NodeId,
}

#[derive(Deserialize)]
struct BoxModelResult {
    model: BoxModel,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutMetricsResult {
    layout_viewport: LayoutViewport,
}

#[derive(Deserialize)]
struct CssProperty {
    name: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputedStyleResult {
    computed_style: Vec<CssProperty>,
}

async fn call<S, T>(sender: &S, method: &str, params: Value) -> Result<T>
where
    S: CommandSender + ?Sized,
    T: DeserializeOwned,
{
    let result = sender.send_command(method, params).await?;
    serde_json::from_value(result).map_err(|e| DiagnosticsError::MalformedResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Root node of the full document tree
pub async fn document_root<S: CommandSender + ?Sized>(sender: &S) -> Result<NodeId> {
    let document: DocumentResult = call(sender, "DOM.getDocument", json!({ "depth": -1 })).await?;
    Ok(document.root.node_id)
}

/// First match for `selector` under `root`, `None` when nothing matches
pub async fn query_selector<S: CommandSender + ?Sized>(
    sender: &S,
    root: NodeId,
    selector: &str,
) -> Result<Option<NodeId>> {
    let found: QuerySelectorResult = call(
        sender,
        "DOM.querySelector",
        json!({ "nodeId": root, "selector": selector }),
    )
    .await?;
    Ok(Some(found.node_id).filter(|id| *id != 0))
}

pub async fn box_model<S: CommandSender + ?Sized>(sender: &S, node: NodeId) -> Result<BoxModel> {
    let result: BoxModelResult = call(sender, "DOM.getBoxModel", json!({ "nodeId": node })).await?;
    if result.model.content.len() < 8 {
        return Err(DiagnosticsError::MalformedResponse {
            method: "DOM.getBoxModel".to_string(),
            reason: format!("content quad has {} coordinates", result.model.content.len()),
        });
    }
    Ok(result.model)
}

pub async fn layout_viewport<S: CommandSender + ?Sized>(sender: &S) -> Result<LayoutViewport> {
    let metrics: LayoutMetricsResult = call(sender, "Page.getLayoutMetrics", json!({})).await?;
    Ok(metrics.layout_viewport)
}

pub async fn computed_style<S: CommandSender + ?Sized>(sender: &S, node: NodeId) -> Result<StyleMap> {
    let result: ComputedStyleResult = call(
        sender,
        "CSS.getComputedStyleForNode",
        json!({ "nodeId": node }),
    )
    .await?;
    Ok(result
        .computed_style
        .into_iter()
        .map(|prop| (prop.name, prop.value))
        .collect())
}
