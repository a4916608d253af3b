//! Gravity MCP server.
//!
//! Exposes layout diagnosis as MCP tools over stdio JSON-RPC.

pub mod error;
pub mod jsonrpc;
pub mod server;
pub mod tools;

pub use error::ToolError;
pub use server::McpServer;
