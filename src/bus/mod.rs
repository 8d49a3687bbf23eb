//! Event bus bridge.
//!
//! Exposes the server-side event bus to editors over a single WebSocket
//! endpoint at `/eventbus`. Clients exchange JSON frames (see
//! [`wiki_types::bus`]) to issue request/reply calls against bus handlers
//! (the markdown renderer at `app.markdown`) and to register for topics
//! (`page.saved`).

pub mod bridge;
pub mod connection;
pub mod handler;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use wiki_types::bus::EVENTBUS_PATH;

pub use bridge::{BridgeOptions, BusHandler, EventBus, HandlerError, MarkdownRenderer};
use handler::BusState;

/// Create the event bus router.
pub fn router(bus: Arc<EventBus>) -> Router {
    Router::new()
        .route(EVENTBUS_PATH, get(handler::ws_handler))
        .with_state(BusState { bus })
}
