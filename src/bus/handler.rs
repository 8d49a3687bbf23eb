//! Event bus WebSocket handlers.

use super::bridge::EventBus;
use super::connection::BusConnection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};
use wiki_types::{ClientFrame, FailureType, ServerFrame};

/// Keep-alive ping interval (30 seconds)
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout for considering a connection dead (90 seconds = 3 missed pings)
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(90);

/// Event bus state shared across handlers.
#[derive(Clone)]
pub struct BusState {
    pub bus: Arc<EventBus>,
}

/// Handle WebSocket upgrade request.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<BusState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.bus))
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode server frame: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(text)).await
}

/// Handle an established event bus connection.
async fn handle_socket(mut socket: WebSocket, bus: Arc<EventBus>) {
    // Replies from spawned handler calls come back through this queue
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(256);
    let mut conn = BusConnection::new(tx);
    let conn_id = conn.id.clone();
    info!(conn_id = %conn_id, "Event bus connected");

    let mut events = bus.broadcaster().subscribe();

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                if let Err(e) = send_frame(&mut socket, &frame).await {
                    debug!(conn_id = %conn_id, "Failed to send frame: {}", e);
                    break;
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !conn.is_registered(&event.address) {
                            continue;
                        }
                        let frame = ServerFrame::Rec { address: event.address, body: event.body };
                        if let Err(e) = send_frame(&mut socket, &frame).await {
                            debug!(conn_id = %conn_id, "Failed to deliver topic message: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id = %conn_id, "Event bus connection lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(conn_id = %conn_id, "Bus broadcaster closed");
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if conn.last_activity.elapsed() > CONNECTION_TIMEOUT {
                    warn!(conn_id = %conn_id, "Connection timed out (no activity for {:?})", CONNECTION_TIMEOUT);
                    let _ = socket.close().await;
                    break;
                }
                if let Err(e) = socket.send(Message::Ping(vec![])).await {
                    debug!(conn_id = %conn_id, "Failed to send ping: {}", e);
                    break;
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        conn.touch();
                        handle_text(&mut conn, &text, &bus).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        conn.touch();
                        match String::from_utf8(data) {
                            Ok(text) => handle_text(&mut conn, &text, &bus).await,
                            Err(_) => {
                                conn.try_send(ServerFrame::error(None, FailureType::BadFrame, "Frames must be UTF-8 JSON"));
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        conn.touch();
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(conn_id = %conn_id, "Client initiated close");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(conn_id = %conn_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(conn_id = %conn_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    info!(conn_id = %conn_id, "Event bus disconnected");
}

/// Decode and dispatch one client frame.
async fn handle_text(conn: &mut BusConnection, text: &str, bus: &Arc<EventBus>) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(conn_id = %conn.id, "Bad frame: {}", e);
            conn.try_send(ServerFrame::error(
                None,
                FailureType::BadFrame,
                format!("Bad frame: {}", e),
            ));
            return;
        }
    };

    match frame {
        ClientFrame::Send {
            address,
            body,
            reply_address,
        } => {
            if !bus.options().inbound_permitted(&address) {
                conn.try_send(access_denied(reply_address, &address));
                return;
            }

            let Some(reply_address) = reply_address else {
                bus.publish(&address, body).await;
                return;
            };

            // Handlers may be slow; keep the connection loop free
            let bus = bus.clone();
            let sender = conn.sender.clone();
            tokio::spawn(async move {
                let frame = match bus.request(&address, body).await {
                    Ok(body) => ServerFrame::Rec {
                        address: reply_address,
                        body,
                    },
                    Err((failure_type, message)) => {
                        ServerFrame::error(Some(reply_address), failure_type, message)
                    }
                };
                let _ = sender.send(frame).await;
            });
        }
        ClientFrame::Publish { address, body } => {
            if !bus.options().inbound_permitted(&address) {
                conn.try_send(access_denied(None, &address));
                return;
            }
            bus.publish(&address, body).await;
        }
        ClientFrame::Register { address } => {
            if !bus.options().outbound_permitted(&address) {
                conn.try_send(access_denied(Some(address.clone()), &address));
                return;
            }
            debug!(conn_id = %conn.id, address = %address, "Registered");
            conn.register(&address);
        }
        ClientFrame::Unregister { address } => {
            debug!(conn_id = %conn.id, address = %address, "Unregistered");
            conn.unregister(&address);
        }
        ClientFrame::Ping => {
            conn.try_send(ServerFrame::Pong);
        }
    }
}

fn access_denied(reply_to: Option<String>, address: &str) -> ServerFrame {
    ServerFrame::error(
        reply_to,
        FailureType::AccessDenied,
        format!("Access denied to address {}", address),
    )
}
