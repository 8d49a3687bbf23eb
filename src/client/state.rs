//! Editor session state.
//!
//! [`EditorState`] is the single mutation target of the editor core. Views
//! observe it through a `watch::Receiver<EditorSnapshot>` and never mutate it.

use std::sync::Arc;
use tokio::sync::watch;
use wiki_types::{Page, PageId, PageSummary};

/// Transient status message for the view (save/load outcomes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSnapshot {
    /// Open page; `page.html` is the live preview
    pub page: Page,
    /// Another client saved the open page since it was loaded
    pub concurrent_edit: bool,
    pub pages: Vec<PageSummary>,
    pub status: Option<Status>,
}

#[derive(Clone)]
pub struct EditorState {
    tx: Arc<watch::Sender<EditorSnapshot>>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(EditorSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        self.tx.borrow().clone()
    }

    pub fn open_page_id(&self) -> Option<PageId> {
        self.tx.borrow().page.id
    }

    pub fn concurrent_edit(&self) -> bool {
        self.tx.borrow().concurrent_edit
    }

    /// Start a fresh draft. Clears the concurrent-edit flag.
    pub fn start_draft(&self, page: Page) {
        self.tx.send_modify(|snap| {
            snap.page = page;
            snap.concurrent_edit = false;
        });
    }

    /// Replace the open page wholesale after a load. The flag was cleared
    /// when the load began; a save seen while the fetch was in flight keeps it set.
    pub fn load_page(&self, page: Page) {
        self.tx.send_modify(|snap| snap.page = page);
    }

    /// Clear the flag when a load begins, before the page arrives.
    pub fn clear_concurrent_edit(&self) {
        self.tx.send_if_modified(|snap| std::mem::replace(&mut snap.concurrent_edit, false));
    }

    pub fn set_markdown(&self, markdown: &str) {
        self.tx.send_if_modified(|snap| {
            if snap.page.markdown == markdown {
                return false;
            }
            snap.page.markdown = markdown.to_string();
            true
        });
    }

    pub fn set_name(&self, name: &str) {
        self.tx.send_modify(|snap| snap.page.name = name.to_string());
    }

    /// Apply a rendered preview.
    pub fn set_rendering(&self, html: String) {
        self.tx.send_modify(|snap| snap.page.html = html);
    }

    pub fn set_pages(&self, pages: Vec<PageSummary>) {
        self.tx.send_modify(|snap| snap.pages = pages);
    }

    pub fn set_status(&self, status: Status) {
        self.tx.send_modify(|snap| snap.status = Some(status));
    }

    /// Raise the concurrent-edit flag if `should_flag` accepts the open page id.
    /// The check and the mutation happen under one borrow of the state.
    pub fn flag_concurrent_edit_if<F>(&self, should_flag: F) -> bool
    where
        F: FnOnce(Option<PageId>) -> bool,
    {
        self.tx.send_if_modified(|snap| {
            if snap.concurrent_edit || !should_flag(snap.page.id) {
                return false;
            }
            snap.concurrent_edit = true;
            true
        })
    }
}
