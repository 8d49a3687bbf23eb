//! Concurrent-edit detection.
//!
//! Listens on `page.saved` and raises the session's concurrent-edit flag
//! when another client saves the page that is open here. Saves made by
//! this client come back as echoes and are ignored.

use super::channel::EventChannel;
use super::identity::ClientIdentity;
use super::state::EditorState;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use wiki_types::bus::PAGE_SAVED_ADDRESS;
use wiki_types::{PageId, SaveNotification};

/// Whether `notification` means someone else saved the open page.
///
/// Drafts (`open_page == None`) never match, nor do saves of other pages
/// or echoes of this client's own saves.
pub fn is_concurrent_edit(
    open_page: Option<PageId>,
    own: &ClientIdentity,
    notification: &SaveNotification,
) -> bool {
    let Some(open_page) = open_page else {
        return false;
    };
    notification.id == open_page && !own.matches(&notification.client)
}

pub struct ConcurrentEditDetector {
    subscribed: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ConcurrentEditDetector {
    /// Subscribe to `page.saved` once the channel opens and watch for the
    /// rest of the session.
    pub fn spawn(
        channel: Arc<dyn EventChannel>,
        identity: ClientIdentity,
        state: EditorState,
    ) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        let task = tokio::spawn(run(channel, identity, state, ready_tx));
        Self {
            subscribed: ready_rx,
            task,
        }
    }

    /// Wait until the subscription is in place. Returns false if the
    /// detector gave up (the channel never opened or closed).
    pub async fn subscribed(&self) -> bool {
        let mut rx = self.subscribed.clone();
        let subscribed = rx.wait_for(|subscribed| *subscribed).await.is_ok();
        subscribed
    }
}

impl Drop for ConcurrentEditDetector {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    channel: Arc<dyn EventChannel>,
    identity: ClientIdentity,
    state: EditorState,
    ready: watch::Sender<bool>,
) {
    if let Err(e) = channel.opened().await {
        warn!("Event channel never opened; concurrent-edit detection disabled: {}", e);
        return;
    }

    let mut subscription = match channel.subscribe(PAGE_SAVED_ADDRESS).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("Failed to subscribe to {}: {}", PAGE_SAVED_ADDRESS, e);
            return;
        }
    };
    ready.send_replace(true);
    debug!(client = %identity, "Watching for concurrent saves");

    while let Some(message) = subscription.recv().await {
        let body = match message {
            Ok(body) => body,
            Err(e) => {
                warn!("{} delivery error: {}", subscription.address(), e);
                continue;
            }
        };

        let notification: SaveNotification = match serde_json::from_value(body) {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Malformed save notification: {}", e);
                continue;
            }
        };

        if state.flag_concurrent_edit_if(|open| is_concurrent_edit(open, &identity, &notification))
        {
            info!(page_id = notification.id, "Open page was saved by another client");
        } else {
            trace!(page_id = notification.id, client = %notification.client, "Save notification ignored");
        }
    }

    debug!("Save notifications ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::channel::{ChannelError, ChannelState};
    use crate::client::testing::FakeChannel;
    use serde_json::json;
    use std::time::Duration;
    use wiki_types::Page;

    fn note(id: PageId, client: &str) -> SaveNotification {
        SaveNotification {
            id,
            client: client.to_string(),
        }
    }

    fn open_page(state: &EditorState, id: PageId) {
        state.load_page(Page {
            id: Some(id),
            name: "p1".to_string(),
            markdown: String::new(),
            html: String::new(),
        });
    }

    #[test]
    fn test_echo_is_never_a_concurrent_edit() {
        let me = ClientIdentity::from_tag("A");
        for open in [None, Some(7), Some(8)] {
            assert!(!is_concurrent_edit(open, &me, &note(7, "A")));
        }
    }

    #[test]
    fn test_other_page_is_ignored() {
        let me = ClientIdentity::from_tag("A");
        assert!(!is_concurrent_edit(Some(8), &me, &note(7, "B")));
    }

    #[test]
    fn test_draft_is_ignored() {
        let me = ClientIdentity::from_tag("A");
        assert!(!is_concurrent_edit(None, &me, &note(7, "B")));
    }

    #[test]
    fn test_other_client_on_open_page_is_detected() {
        let me = ClientIdentity::from_tag("A");
        assert!(is_concurrent_edit(Some(7), &me, &note(7, "other")));
        // A save without a client tag is someone else's
        assert!(is_concurrent_edit(Some(7), &me, &note(7, "")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_flags_save_from_other_client() {
        let channel = Arc::new(FakeChannel::open());
        let state = EditorState::new();
        open_page(&state, 7);

        let detector =
            ConcurrentEditDetector::spawn(channel.clone(), ClientIdentity::from_tag("A"), state.clone());
        assert!(detector.subscribed().await);

        channel.deliver(PAGE_SAVED_ADDRESS, Ok(json!({"id": 7, "client": "B"})));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(state.concurrent_edit());

        // Reloading the same page clears it
        state.clear_concurrent_edit();
        open_page(&state, 7);
        assert!(!state.concurrent_edit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_ignores_echo_and_bad_messages() {
        let channel = Arc::new(FakeChannel::open());
        let state = EditorState::new();
        open_page(&state, 7);

        let detector =
            ConcurrentEditDetector::spawn(channel.clone(), ClientIdentity::from_tag("A"), state.clone());
        assert!(detector.subscribed().await);

        channel.deliver(PAGE_SAVED_ADDRESS, Ok(json!({"id": 7, "client": "A"})));
        channel.deliver(PAGE_SAVED_ADDRESS, Ok(json!({"id": 9, "client": "B"})));
        channel.deliver(PAGE_SAVED_ADDRESS, Ok(json!("garbage")));
        channel.deliver(PAGE_SAVED_ADDRESS, Err(ChannelError::Closed));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!state.concurrent_edit());

        // Still listening after the bad messages
        channel.deliver(PAGE_SAVED_ADDRESS, Ok(json!({"id": 7, "client": "B"})));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(state.concurrent_edit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_waits_for_open_channel() {
        let channel = Arc::new(FakeChannel::open());
        channel.set_state(ChannelState::Connecting);
        let state = EditorState::new();

        let detector =
            ConcurrentEditDetector::spawn(channel.clone(), ClientIdentity::from_tag("A"), state);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!channel.is_subscribed(PAGE_SAVED_ADDRESS));

        channel.set_state(ChannelState::Open);
        assert!(detector.subscribed().await);
        assert!(channel.is_subscribed(PAGE_SAVED_ADDRESS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_gives_up_when_channel_closes() {
        let channel = Arc::new(FakeChannel::open());
        channel.set_state(ChannelState::Connecting);

        let detector = ConcurrentEditDetector::spawn(
            channel.clone(),
            ClientIdentity::from_tag("A"),
            EditorState::new(),
        );
        channel.set_state(ChannelState::Closed);
        assert!(!detector.subscribed().await);
    }
}
