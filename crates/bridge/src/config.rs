//! Bridge configuration
//!
//! Plain data with sensible defaults. Binaries layer CLI flags and
//! environment variables on top.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::codec::MAX_FRAME_LEN;

/// Port shared by the native host and its clients
pub const DEFAULT_PORT: u16 = 9224;

/// Connect and per-request timeout. Must stay below the extension's own
/// 12s CDP timeout so the client always gives up first.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 2_000;

/// Connection client options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub auto_reconnect: bool,
    pub reconnect_interval_ms: u64,
    /// Period of outbound keep-alive envelopes; disabled when `None`
    pub keep_alive_ms: Option<u64>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auto_reconnect: true,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            keep_alive_ms: None,
        }
    }
}

impl BridgeOptions {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Relay server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_len: usize,
    /// Tell the extension when an MCP client attaches or leaves
    pub announce_status: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_frame_len: MAX_FRAME_LEN,
            announce_status: true,
        }
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.url(), "ws://localhost:9224");
        assert_eq!(options.timeout(), Duration::from_secs(10));
        assert_eq!(options.reconnect_interval(), Duration::from_secs(2));
        assert!(options.auto_reconnect);
        assert!(options.keep_alive().is_none());

        assert_eq!(RelayConfig::default().bind_addr(), "127.0.0.1:9224");
    }

    #[test]
    fn test_partial_options_fill_defaults() {
        let options: BridgeOptions =
            serde_json::from_str(r#"{"port": 9333, "keep_alive_ms": 0}"#).unwrap();
        assert_eq!(options.port, 9333);
        assert_eq!(options.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(options.keep_alive().is_none());
    }
}
