//! Gravity bridge - message relay between a browser extension and MCP
//!
//! Two halves of one protocol:
//!
//! - [`relay`]: the native messaging host. Speaks length-prefixed JSON
//!   frames with the extension over stdio and plain JSON text frames with a
//!   single MCP client over WebSocket.
//! - [`connection`]: the MCP side. One WebSocket to the relay, CDP commands
//!   correlated to their responses by a monotonic id, timeouts, and
//!   auto-reconnect.
//!
//! # Design rules
//!
//! 1. **Exactly one resolution per request**: response, timeout or close,
//!    whichever removes the pending entry first
//! 2. **No buffering across peers**: nobody listening means the message is
//!    dropped
//! 3. **Instances, not globals**: every server and client owns its state

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;
pub mod relay;
pub mod signal;

pub use codec::{FrameError, NativeFrameCodec, MAX_FRAME_LEN};
pub use config::{BridgeOptions, RelayConfig, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
pub use connection::{
    probe_relay, BrowserConnection, CommandSender, ConnectionState, ConnectionStatus,
};
pub use error::{BridgeError, RelayError, Result};
pub use events::{ConnectionEvent, EventBus};
pub use protocol::{CdpRequest, CdpResponse, Envelope, RequestId};
pub use relay::{RelayExit, RelayServer};
