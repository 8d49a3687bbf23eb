//! WebSocket implementation of [`EventChannel`].
//!
//! Frames are JSON text messages (see [`wiki_types::bus`]). Request/reply
//! correlation uses a fresh UUID reply address per `send`; replies and topic
//! messages are routed by address on a single reader task.

use super::channel::{ChannelError, ChannelState, EventChannel, Subscription};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex, Notify};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use wiki_types::{ClientFrame, ServerFrame};

/// Outstanding `send` calls keyed by reply address.
type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, ChannelError>>>>>;

/// Local subscribers keyed by topic address.
type Subscribers =
    Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Result<Value, ChannelError>>>>>>;

/// Application-level keep-alive towards the bus.
const PING_INTERVAL: Duration = Duration::from_secs(5);

pub struct WsChannel {
    state: watch::Receiver<ChannelState>,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    pending: PendingReplies,
    subscribers: Subscribers,
    shutdown: Arc<Notify>,
}

impl WsChannel {
    /// Start connecting to `url` (e.g. `ws://127.0.0.1:8080/eventbus`).
    ///
    /// Returns immediately in the `Connecting` state; use
    /// [`EventChannel::opened`] to wait for the connection.
    pub fn connect(url: impl Into<String>) -> Self {
        let url = url.into();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(run_connection(
            url,
            state_tx,
            out_rx,
            out_tx.clone(),
            pending.clone(),
            subscribers.clone(),
            shutdown.clone(),
        ));

        Self {
            state: state_rx,
            outgoing: out_tx,
            pending,
            subscribers,
            shutdown,
        }
    }

    /// Close the connection. The channel moves to `Closed` and never reopens.
    pub fn close(&self) {
        self.shutdown.notify_one();
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if *self.state.borrow() == ChannelState::Open {
            Ok(())
        } else {
            Err(ChannelError::NotReady)
        }
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

#[async_trait]
impl EventChannel for WsChannel {
    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    async fn opened(&self) -> Result<(), ChannelError> {
        let mut rx = self.state.clone();
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
        self.ensure_open()?;

        let reply_address = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(reply_address.clone(), tx);

        let frame = ClientFrame::Send {
            address: address.to_string(),
            body,
            reply_address: Some(reply_address.clone()),
        };
        if self.outgoing.send(frame).is_err() {
            self.pending.lock().await.remove(&reply_address);
            return Err(ChannelError::Closed);
        }

        rx.await.unwrap_or(Err(ChannelError::Closed))
    }

    fn publish(&self, address: &str, body: Value) -> Result<(), ChannelError> {
        self.ensure_open()?;
        self.outgoing
            .send(ClientFrame::Publish {
                address: address.to_string(),
                body,
            })
            .map_err(|_| ChannelError::Closed)
    }

    async fn subscribe(&self, address: &str) -> Result<Subscription, ChannelError> {
        self.ensure_open()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let first = {
            let mut subscribers = self.subscribers.lock().await;
            let list = subscribers.entry(address.to_string()).or_default();
            list.push(tx);
            list.len() == 1
        };

        if first {
            self.outgoing
                .send(ClientFrame::Register {
                    address: address.to_string(),
                })
                .map_err(|_| ChannelError::Closed)?;
            debug!(address = %address, "Registered for bus address");
        }

        Ok(Subscription::new(address, rx))
    }
}

async fn run_connection(
    url: String,
    state: watch::Sender<ChannelState>,
    mut outgoing: mpsc::UnboundedReceiver<ClientFrame>,
    control: mpsc::UnboundedSender<ClientFrame>,
    pending: PendingReplies,
    subscribers: Subscribers,
    shutdown: Arc<Notify>,
) {
    let stream = tokio::select! {
        connected = tokio_tungstenite::connect_async(url.as_str()) => match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                warn!(url = %url, "Event channel connection failed: {}", e);
                close_out(&state, &mut outgoing, &pending, &subscribers).await;
                return;
            }
        },
        _ = shutdown.notified() => {
            close_out(&state, &mut outgoing, &pending, &subscribers).await;
            return;
        }
    };

    info!(url = %url, "Event channel open");
    state.send_replace(ChannelState::Open);

    let (mut write, mut read) = stream.split();
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }

            frame = outgoing.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write_frame(&mut write, &frame).await {
                    warn!(url = %url, "Failed to write to event channel: {}", e);
                    break;
                }
            }

            _ = ping.tick() => {
                if let Err(e) = write_frame(&mut write, &ClientFrame::Ping).await {
                    debug!(url = %url, "Failed to ping event channel: {}", e);
                    break;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&text, &pending, &subscribers, &control).await;
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => dispatch(&text, &pending, &subscribers, &control).await,
                        Err(_) => warn!(url = %url, "Ignoring non UTF-8 frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!(url = %url, "Event channel closed by server");
                        break;
                    }
                    // Ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(url = %url, "Event channel error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    close_out(&state, &mut outgoing, &pending, &subscribers).await;
}

async fn write_frame<S>(write: &mut S, frame: &ClientFrame) -> Result<(), ChannelError>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|e| ChannelError::Codec(e.to_string()))?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| ChannelError::Transport(e.to_string()))
}

/// Move to `Closed`: stop accepting frames first, then fail every waiter,
/// so no `send` can register a reply that is never completed.
async fn close_out(
    state: &watch::Sender<ChannelState>,
    outgoing: &mut mpsc::UnboundedReceiver<ClientFrame>,
    pending: &PendingReplies,
    subscribers: &Subscribers,
) {
    outgoing.close();
    state.send_replace(ChannelState::Closed);

    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(ChannelError::Closed));
    }
    subscribers.lock().await.clear();
}

/// Route one server frame to the waiting `send` or to topic subscribers.
async fn dispatch(
    text: &str,
    pending: &PendingReplies,
    subscribers: &Subscribers,
    control: &mpsc::UnboundedSender<ClientFrame>,
) {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Undecodable frame from bus: {}", e);
            return;
        }
    };

    let (address, item) = match frame {
        ServerFrame::Rec { address, body } => (address, Ok(body)),
        ServerFrame::Err {
            address: Some(address),
            failure_code,
            failure_type,
            message,
        } => (
            address,
            Err(ChannelError::Remote {
                code: failure_code,
                failure_type,
                message,
            }),
        ),
        ServerFrame::Err {
            address: None,
            failure_type,
            message,
            ..
        } => {
            warn!(failure_type = ?failure_type, "Bus reported an error: {}", message);
            return;
        }
        ServerFrame::Pong => {
            trace!("Bus pong");
            return;
        }
    };

    let reply = pending.lock().await.remove(&address);
    if let Some(tx) = reply {
        let _ = tx.send(item);
        return;
    }

    let mut subscribers = subscribers.lock().await;
    let Some(list) = subscribers.get_mut(&address) else {
        debug!(address = %address, "No local receiver for bus message");
        return;
    };

    list.retain(|tx| tx.send(item.clone()).is_ok());
    if list.is_empty() {
        subscribers.remove(&address);
        let _ = control.send(ClientFrame::Unregister { address });
    }
}
