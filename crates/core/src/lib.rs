//! Gravity layout diagnostics
//!
//! Turns "why can't I see this element?" into a structured report, using
//! nothing but CDP commands sent through the bridge.
//!
//! ## Core Design
//!
//! ```text
//! selector → validate → CDP (document, node, box, viewport, style)
//!                              ↓
//!                        checks → sorted issues → DiagnosticResult
//! ```
//!
//! The engine depends only on [`gravity_bridge::CommandSender`], so it runs
//! the same against a live connection or a scripted one.

pub mod cdp;
pub mod checks;
pub mod error;
pub mod gravity;
pub mod selector;
pub mod service;
pub mod types;

pub use error::{DiagnosticsError, Result};
pub use gravity::Gravity;
pub use service::DiagnosticsEngine;
pub use types::*;
