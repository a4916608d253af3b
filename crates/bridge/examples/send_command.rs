//! Send one CDP command through a running native host
//!
//! Usage: cargo run --example send_command -- [port] [selector]

use gravity_bridge::{probe_relay, BridgeOptions, BrowserConnection, DEFAULT_PORT};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => DEFAULT_PORT,
    };
    let selector = args.next().unwrap_or_else(|| "body".to_string());

    if !probe_relay(port, Duration::from_secs(3)).await {
        println!("No native host listening on port {}", port);
        return Ok(());
    }

    let connection = BrowserConnection::new(BridgeOptions::default().with_port(port));
    connection.connect().await?;
    println!("Connected: {:?}", connection.status());

    let document = connection
        .send_command("DOM.getDocument", json!({ "depth": -1 }))
        .await?;
    let root = document["root"]["nodeId"].as_i64().unwrap_or(0);

    let found = connection
        .send_command(
            "DOM.querySelector",
            json!({ "nodeId": root, "selector": selector }),
        )
        .await?;
    println!("{} -> {}", selector, found);

    connection.disconnect().await;
    println!("Disconnected");

    Ok(())
}
