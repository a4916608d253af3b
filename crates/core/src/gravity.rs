//! Gravity - one handle for connecting and diagnosing
//!
//! Owns the connection and the engine running over it. Lifecycle events
//! go out on a bus owned here, so subscribers survive a port change.

use gravity_bridge::{
    BridgeOptions, BrowserConnection, ConnectionEvent, ConnectionStatus, EventBus,
};
use tokio::sync::broadcast;

use crate::error::{DiagnosticsError, Result};
use crate::service::DiagnosticsEngine;
use crate::types::DiagnosticResult;

pub struct Gravity {
    options: BridgeOptions,
    events: EventBus,
    engine: DiagnosticsEngine<BrowserConnection>,
}

impl Gravity {
    pub fn new(options: BridgeOptions) -> Self {
        let events = EventBus::new();
        let connection = BrowserConnection::with_event_bus(options.clone(), events.clone());
        Self {
            options,
            events,
            engine: DiagnosticsEngine::new(connection),
        }
    }

    /// Connect to the native host, optionally on a different port.
    ///
    /// A new port replaces the connection; every other option carries over.
    pub async fn connect_browser(&mut self, port: Option<u16>) -> Result<()> {
        if let Some(port) = port.filter(|port| *port != self.options.port) {
            tracing::info!(port, "Switching Gravity port");
            self.connection().disconnect().await;
            self.options = self.options.clone().with_port(port);
            let connection =
                BrowserConnection::with_event_bus(self.options.clone(), self.events.clone());
            self.engine = DiagnosticsEngine::new(connection);
        }

        self.connection().connect().await?;
        Ok(())
    }

    pub async fn disconnect_browser(&self) {
        self.connection().disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_connected()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection().status()
    }

    pub async fn diagnose_layout(&self, selector: &str) -> Result<DiagnosticResult> {
        if !self.is_connected() {
            return Err(DiagnosticsError::NotConnected);
        }
        self.engine.diagnose(selector).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn connection(&self) -> &BrowserConnection {
        self.engine.sender()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }
}
