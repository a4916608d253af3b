//! gravity-native-host - launched by the browser as a native messaging host
//!
//! stdout carries native messaging frames, so every log line goes to stderr.

use clap::Parser;
use std::process::ExitCode;

use gravity_bridge::signal::shutdown_signal;
use gravity_bridge::{RelayConfig, RelayExit, RelayServer};

/// Relay between the Gravity extension (stdio) and an MCP client (WebSocket)
#[derive(Parser, Debug)]
#[command(name = "gravity-native-host", version, about)]
struct Cli {
    /// Caller origin, passed by the browser (e.g. chrome-extension://<id>/)
    origin: Option<String>,

    /// Handle of the calling window, passed by the browser on Windows
    #[arg(long = "parent-window")]
    parent_window: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(origin = ?cli.origin, parent_window = ?cli.parent_window, "[Native Host] Starting");

    let server = match RelayServer::bind(RelayConfig::default()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("[Native Host] {}", e);
            return ExitCode::FAILURE;
        }
    };

    match server
        .run(tokio::io::stdin(), tokio::io::stdout(), shutdown_signal())
        .await
    {
        Ok(RelayExit::UpstreamClosed) | Ok(RelayExit::Shutdown) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("[Native Host] {}", e);
            ExitCode::FAILURE
        }
    }
}
