//! Editor controller: wires the page client, render scheduler and
//! concurrent-edit detector around one [`EditorState`].

use super::channel::EventChannel;
use super::detector::ConcurrentEditDetector;
use super::identity::ClientIdentity;
use super::pages::{PageClient, PageClientError};
use super::scheduler::{RenderScheduler, DEFAULT_QUIESCENCE};
use super::state::{EditorSnapshot, EditorState, Status};
use super::ws_channel::WsChannel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use wiki_types::{Page, PageId};

pub const DEFAULT_PAGENAME: &str = "Example page";
pub const DEFAULT_MARKDOWN: &str = "# Example page\n\nSome text _here_.\n";

#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Base URL of the wiki server, e.g. `http://127.0.0.1:8080`
    pub server: String,
    /// Quiet period before a preview render is requested
    pub quiescence: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8080".to_string(),
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

pub struct Editor {
    pages: PageClient,
    state: EditorState,
    identity: ClientIdentity,
    channel: Arc<dyn EventChannel>,
    scheduler: RenderScheduler,
    detector: ConcurrentEditDetector,
}

impl Editor {
    /// Connect to the server's event bus and build an editor session.
    pub fn connect(config: EditorConfig) -> Self {
        let channel = Arc::new(WsChannel::connect(super::eventbus_url(&config.server)));
        Self::with_channel(config, channel)
    }

    /// Build an editor session over an existing channel.
    pub fn with_channel(config: EditorConfig, channel: Arc<dyn EventChannel>) -> Self {
        let identity = ClientIdentity::generate();
        let state = EditorState::new();
        let scheduler = RenderScheduler::spawn(channel.clone(), state.clone(), config.quiescence);
        let detector = ConcurrentEditDetector::spawn(channel.clone(), identity.clone(), state.clone());
        info!(client = %identity, server = %config.server, "Editor session started");

        Self {
            pages: PageClient::new(config.server),
            state,
            identity,
            channel,
            scheduler,
            detector,
        }
    }

    /// Fetch the page list and open a fresh draft.
    pub async fn start(&self) {
        let _ = self.reload().await;
        self.new_page();
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn channel(&self) -> &Arc<dyn EventChannel> {
        &self.channel
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorSnapshot> {
        self.state.subscribe()
    }

    /// Wait until concurrent-edit detection is live.
    pub async fn ready(&self) -> bool {
        self.detector.subscribed().await
    }

    pub fn new_page(&self) {
        self.state
            .start_draft(Page::draft(DEFAULT_PAGENAME, DEFAULT_MARKDOWN));
        self.scheduler.text_changed(DEFAULT_MARKDOWN);
    }

    /// Open a page. The concurrent-edit flag is cleared even if the fetch fails.
    pub async fn load(&self, id: PageId) -> Result<(), PageClientError> {
        self.state.clear_concurrent_edit();

        let page = self.report(self.pages.get_page(id).await)?;
        let markdown = page.markdown.clone();
        self.state.load_page(page);
        // Supersedes any render still pending for the previous page
        self.scheduler.text_changed(markdown);
        Ok(())
    }

    pub fn edit_markdown(&self, markdown: &str) {
        self.state.set_markdown(markdown);
        self.scheduler.text_changed(markdown);
    }

    pub fn rename(&self, name: &str) {
        self.state.set_name(name);
    }

    /// Create the draft or save the open page.
    pub async fn save(&self) -> Result<(), PageClientError> {
        let page = self.state.snapshot().page;

        match page.id {
            None => {
                let id = self.report(self.pages.create_page(&page.name, &page.markdown).await)?;
                let _ = self.reload().await;
                self.state.set_status(Status::Success("Page created".to_string()));
                self.load(id).await
            }
            Some(id) => {
                self.report(
                    self.pages
                        .update_page(id, &page.markdown, &self.identity)
                        .await,
                )?;
                self.state.set_status(Status::Success("Page saved".to_string()));
                Ok(())
            }
        }
    }

    pub async fn delete(&self) -> Result<(), PageClientError> {
        let id = self.report(self.state.open_page_id().ok_or(PageClientError::Draft))?;
        self.report(self.pages.delete_page(id).await)?;

        let _ = self.reload().await;
        self.new_page();
        self.state.set_status(Status::Success("Page deleted".to_string()));
        Ok(())
    }

    /// Refresh the page list.
    pub async fn reload(&self) -> Result<(), PageClientError> {
        let pages = self.report(self.pages.list_pages().await)?;
        self.state.set_pages(pages);
        Ok(())
    }

    /// Surface a page-store failure as a status message and pass it on.
    fn report<T>(&self, result: Result<T, PageClientError>) -> Result<T, PageClientError> {
        if let Err(e) = &result {
            warn!("Page store request failed: {}", e);
            self.state.set_status(Status::Error(e.to_string()));
        }
        result
    }
}
