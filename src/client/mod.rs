//! Editor client.
//!
//! The live-preview core: a per-session [`ClientIdentity`], an
//! [`EventChannel`] to the server bus, the debounced [`RenderScheduler`],
//! the [`ConcurrentEditDetector`] and the [`EditorState`] they all mutate.
//! [`Editor`] wires them to the page store API.

pub mod channel;
pub mod detector;
pub mod editor;
pub mod identity;
pub mod pages;
pub mod scheduler;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
pub mod ws_channel;

pub use channel::{ChannelError, ChannelState, EventChannel, Subscription};
pub use detector::{is_concurrent_edit, ConcurrentEditDetector};
pub use editor::{Editor, EditorConfig};
pub use identity::ClientIdentity;
pub use pages::{PageClient, PageClientError};
pub use scheduler::{RenderScheduler, DEFAULT_QUIESCENCE};
pub use state::{EditorSnapshot, EditorState, Status};
pub use ws_channel::WsChannel;

use wiki_types::bus::EVENTBUS_PATH;

/// Event bus URL for a server base URL (`http` becomes `ws`, `https` becomes `wss`).
pub fn eventbus_url(server: &str) -> String {
    let base = server.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}{}", base, EVENTBUS_PATH)
}
