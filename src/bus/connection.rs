//! Per-connection state for event bus connections.

use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::mpsc;
use wiki_types::ServerFrame;

/// Unique connection ID.
pub type ConnectionId = String;

#[derive(Debug)]
pub struct BusConnection {
    /// Server-generated UUID
    pub id: ConnectionId,

    /// Topic addresses this connection registered for
    registrations: HashSet<String>,

    /// Last activity timestamp (for timeout detection)
    pub last_activity: Instant,

    /// Sender for frames produced off the connection loop (handler replies)
    pub sender: mpsc::Sender<ServerFrame>,
}

impl BusConnection {
    pub fn new(sender: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            registrations: HashSet::new(),
            last_activity: Instant::now(),
            sender,
        }
    }

    pub fn register(&mut self, address: &str) {
        self.registrations.insert(address.to_string());
    }

    pub fn unregister(&mut self, address: &str) {
        self.registrations.remove(address);
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.registrations.contains(address)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Queue a frame (non-blocking). Returns false if the queue is full or closed.
    pub fn try_send(&self, frame: ServerFrame) -> bool {
        self.sender.try_send(frame).is_ok()
    }
}
