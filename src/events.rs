use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use wiki_types::bus::PAGE_SAVED_ADDRESS;
use wiki_types::SaveNotification;

/// A message published on a bus topic.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub address: String,
    pub body: Value,
}

/// Fan-out of topic messages to every event bus connection.
#[derive(Clone)]
pub struct BusBroadcaster {
    sender: Arc<broadcast::Sender<BusEvent>>,
}

impl BusBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, address: impl Into<String>, body: Value) {
        // Ignore errors when there are no active subscribers
        let _ = self.sender.send(BusEvent {
            address: address.into(),
            body,
        });
    }

    pub fn notify_page_saved(&self, notification: &SaveNotification) {
        match serde_json::to_value(notification) {
            Ok(body) => self.publish(PAGE_SAVED_ADDRESS, body),
            Err(e) => tracing::warn!("Failed to encode page.saved notification: {}", e),
        }
    }
}
