//! In-process [`EventChannel`] for exercising the editor core without a server.

use super::channel::{ChannelError, ChannelState, EventChannel, Subscription};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

type Responder = Box<dyn Fn(&Value) -> (Duration, Result<Value, ChannelError>) + Send + Sync>;

pub struct FakeChannel {
    state: watch::Sender<ChannelState>,
    sent: Mutex<Vec<(String, Value)>>,
    subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<Result<Value, ChannelError>>>>,
    responder: Responder,
}

impl FakeChannel {
    /// An open channel whose replies wrap the request text in `<p>..</p>`.
    pub fn open() -> Self {
        Self::with_responder(|body| {
            let text = body.as_str().unwrap_or_default();
            (Duration::ZERO, Ok(Value::String(format!("<p>{}</p>", text))))
        })
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> (Duration, Result<Value, ChannelError>) + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(ChannelState::Open);
        Self {
            state,
            sent: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            responder: Box::new(responder),
        }
    }

    pub fn set_state(&self, state: ChannelState) {
        self.state.send_replace(state);
    }

    /// Bodies of every `send`, in issue order.
    pub fn sent_bodies(&self) -> Vec<Value> {
        self.sent.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }

    pub fn is_subscribed(&self, address: &str) -> bool {
        self.subscribers.lock().unwrap().contains_key(address)
    }

    /// Push an inbound message to the subscriber of `address`.
    pub fn deliver(&self, address: &str, item: Result<Value, ChannelError>) -> bool {
        match self.subscribers.lock().unwrap().get(address) {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl EventChannel for FakeChannel {
    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    async fn opened(&self) -> Result<(), ChannelError> {
        let mut rx = self.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ChannelState::Open => return Ok(()),
                ChannelState::Closed => return Err(ChannelError::Closed),
                ChannelState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(ChannelError::Closed);
            }
        }
    }

    async fn send(&self, address: &str, body: Value) -> Result<Value, ChannelError> {
        if self.state() != ChannelState::Open {
            return Err(ChannelError::NotReady);
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), body.clone()));

        let (delay, reply) = (self.responder)(&body);
        tokio::time::sleep(delay).await;
        reply
    }

    fn publish(&self, _address: &str, _body: Value) -> Result<(), ChannelError> {
        if self.state() != ChannelState::Open {
            return Err(ChannelError::NotReady);
        }
        Ok(())
    }

    async fn subscribe(&self, address: &str) -> Result<Subscription, ChannelError> {
        if self.state() != ChannelState::Open {
            return Err(ChannelError::NotReady);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap()
            .insert(address.to_string(), tx);
        Ok(Subscription::new(address, rx))
    }
}
