//! Server-side bus: addressed handlers, topic fan-out and bridge permissions.

use crate::events::BusBroadcaster;
use crate::render::render_markdown;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use wiki_types::bus::{MARKDOWN_ADDRESS, PAGE_SAVED_ADDRESS};
use wiki_types::FailureType;

/// Failure raised by a bus handler; reported to the caller as a
/// `recipient_failure`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// A request/reply handler registered at a bus address.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn handle(&self, body: Value) -> Result<Value, HandlerError>;
}

/// Renders a markdown string body to an HTML string reply.
pub struct MarkdownRenderer;

#[async_trait]
impl BusHandler for MarkdownRenderer {
    async fn handle(&self, body: Value) -> Result<Value, HandlerError> {
        let markdown = body
            .as_str()
            .ok_or_else(|| HandlerError("Expected a markdown string".to_string()))?;
        Ok(Value::String(render_markdown(markdown)))
    }
}

/// Addresses that bridged clients may reach.
///
/// `inbound` addresses accept `send`/`publish` from clients, `outbound`
/// addresses accept `register`. Everything else is denied.
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    inbound: HashSet<String>,
    outbound: HashSet<String>,
}

impl BridgeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inbound_permitted(mut self, address: impl Into<String>) -> Self {
        self.inbound.insert(address.into());
        self
    }

    pub fn add_outbound_permitted(mut self, address: impl Into<String>) -> Self {
        self.outbound.insert(address.into());
        self
    }

    pub fn inbound_permitted(&self, address: &str) -> bool {
        self.inbound.contains(address)
    }

    pub fn outbound_permitted(&self, address: &str) -> bool {
        self.outbound.contains(address)
    }

    /// The wiki's bridge: renderer in, save notifications out.
    pub fn wiki() -> Self {
        Self::new()
            .add_inbound_permitted(MARKDOWN_ADDRESS)
            .add_outbound_permitted(PAGE_SAVED_ADDRESS)
    }
}

pub struct EventBus {
    handlers: HashMap<String, Arc<dyn BusHandler>>,
    broadcaster: BusBroadcaster,
    options: BridgeOptions,
}

impl EventBus {
    pub fn new(broadcaster: BusBroadcaster, options: BridgeOptions) -> Self {
        Self {
            handlers: HashMap::new(),
            broadcaster,
            options,
        }
    }

    /// Bus with the markdown renderer registered at `app.markdown`.
    pub fn wiki(broadcaster: BusBroadcaster) -> Self {
        Self::new(broadcaster, BridgeOptions::wiki())
            .with_handler(MARKDOWN_ADDRESS, Arc::new(MarkdownRenderer))
    }

    pub fn with_handler(mut self, address: impl Into<String>, handler: Arc<dyn BusHandler>) -> Self {
        self.handlers.insert(address.into(), handler);
        self
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    pub fn broadcaster(&self) -> &BusBroadcaster {
        &self.broadcaster
    }

    /// Deliver `body` to the handler at `address` and wait for its reply.
    pub async fn request(&self, address: &str, body: Value) -> Result<Value, (FailureType, String)> {
        let handler = self.handlers.get(address).cloned().ok_or_else(|| {
            (
                FailureType::NoHandlers,
                format!("No handlers for address {}", address),
            )
        })?;

        handler
            .handle(body)
            .await
            .map_err(|e| (FailureType::RecipientFailure, e.to_string()))
    }

    /// Fire-and-forget delivery: to the handler if one is registered,
    /// otherwise to every topic subscriber.
    pub async fn publish(&self, address: &str, body: Value) {
        match self.handlers.get(address).cloned() {
            Some(handler) => {
                if let Err(e) = handler.handle(body).await {
                    debug!(address = %address, "Published message failed in handler: {}", e);
                }
            }
            None => self.broadcaster.publish(address, body),
        }
    }
}
