//! Event channel abstraction used by the editor core.
//!
//! The scheduler and detector only see [`EventChannel`]; the WebSocket
//! implementation lives in [`super::ws_channel`].

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use wiki_types::FailureType;

/// Connection lifecycle. Transitions only move forward:
/// `Connecting -> Open -> Closed` (or `Connecting -> Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Operation attempted while the channel is not `Open`.
    #[error("channel not ready")]
    NotReady,

    /// The channel closed before the operation completed.
    #[error("channel closed")]
    Closed,

    /// The remote side reported a failure (e.g. the renderer rejected the body).
    #[error("remote failure ({failure_type:?}, code {code}): {message}")]
    Remote {
        code: i32,
        failure_type: FailureType,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(String),
}

/// Inbound messages for one subscribed address, in arrival order.
///
/// Each item is either a message body or an error addressed to the
/// subscription. `recv` returns `None` once the channel has closed.
pub struct Subscription {
    address: String,
    rx: mpsc::UnboundedReceiver<Result<Value, ChannelError>>,
}

impl Subscription {
    pub fn new(
        address: impl Into<String>,
        rx: mpsc::UnboundedReceiver<Result<Value, ChannelError>>,
    ) -> Self {
        Self {
            address: address.into(),
            rx,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn recv(&mut self) -> Option<Result<Value, ChannelError>> {
        self.rx.recv().await
    }
}

/// A long-lived bidirectional connection to the server bus.
///
/// Every operation fails immediately with [`ChannelError::NotReady`] when
/// the channel is not `Open`; nothing is queued.
#[async_trait]
pub trait EventChannel: Send + Sync {
    fn state(&self) -> ChannelState;

    /// Resolve once the channel is `Open`; fail with `Closed` if it closes first.
    async fn opened(&self) -> Result<(), ChannelError>;

    /// Request/reply. Completes exactly once with the reply body or an error.
    async fn send(&self, address: &str, body: Value) -> Result<Value, ChannelError>;

    /// Fire-and-forget.
    fn publish(&self, address: &str, body: Value) -> Result<(), ChannelError>;

    /// Receive every message addressed to `address` until the channel closes.
    async fn subscribe(&self, address: &str) -> Result<Subscription, ChannelError>;
}
