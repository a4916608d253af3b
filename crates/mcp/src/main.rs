//! gravity-mcp - MCP server for browser layout diagnostics.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gravity_bridge::signal::shutdown_signal;
use gravity_bridge::{BridgeOptions, DEFAULT_PORT, DEFAULT_TIMEOUT_MS, probe_relay};
use gravity_core::Gravity;
use gravity_mcp::McpServer;
use tokio::io::BufReader;

#[derive(Parser)]
#[command(name = "gravity-mcp", version, about = "MCP server for browser layout diagnostics")]
struct Cli {
    /// Native host WebSocket port
    #[arg(long, env = "GRAVITY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Connect and per-command timeout in milliseconds
    #[arg(long, env = "GRAVITY_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout: u64,

    /// Do not reconnect after the native host goes away
    #[arg(long)]
    no_reconnect: bool,

    /// Send a keep-alive every N milliseconds
    #[arg(long)]
    keep_alive: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdio (default)
    Serve,
    /// Check whether a native host is listening, then exit
    Probe {
        /// Give up after this many milliseconds
        #[arg(long, default_value_t = 3000)]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let result = match cli.command {
        Some(Command::Probe { wait }) => probe(cli.port, wait).await,
        Some(Command::Serve) | None => serve(options(&cli)).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn options(cli: &Cli) -> BridgeOptions {
    BridgeOptions {
        port: cli.port,
        timeout_ms: cli.timeout,
        auto_reconnect: !cli.no_reconnect,
        keep_alive_ms: cli.keep_alive,
        ..BridgeOptions::default()
    }
}

async fn probe(port: u16, wait: u64) -> Result<ExitCode> {
    let listening = probe_relay(port, Duration::from_millis(wait)).await;
    // The one place stdout is free for humans
    println!(
        "{}",
        serde_json::json!({ "port": port, "listening": listening })
    );
    Ok(if listening {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(options: BridgeOptions) -> Result<ExitCode> {
    let mut gravity = Gravity::new(options);
    gravity
        .connect_browser(None)
        .await
        .context("Failed to connect to extension")?;

    let server = McpServer::new(gravity);
    let served = server
        .serve(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            shutdown_signal(),
        )
        .await;

    server.gravity().disconnect_browser().await;
    served.context("stdio failed")?;
    Ok(ExitCode::SUCCESS)
}
