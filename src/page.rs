//! In-memory page store.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use wiki_types::{PageId, PageSummary};

/// A stored page. The HTML rendering is computed on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub id: PageId,
    pub title: String,
    pub content: String,
}

impl From<StoredPage> for PageSummary {
    fn from(page: StoredPage) -> Self {
        PageSummary {
            id: page.id,
            name: page.title,
            markdown: page.content,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("there is no page with ID {0}")]
    NotFound(PageId),
    #[error("a page named {0:?} already exists")]
    DuplicateName(String),
}

struct Pages {
    by_id: BTreeMap<PageId, StoredPage>,
    next_id: PageId,
}

pub struct PageStore {
    pages: Arc<RwLock<Pages>>,
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(RwLock::new(Pages {
                by_id: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }

    /// All pages with their content, in id order.
    pub async fn all_pages_data(&self) -> Vec<StoredPage> {
        let pages = self.pages.read().await;
        pages.by_id.values().cloned().collect()
    }

    pub async fn get_page(&self, id: PageId) -> Option<StoredPage> {
        let pages = self.pages.read().await;
        pages.by_id.get(&id).cloned()
    }

    /// Insert a new page and return its id. Titles are unique.
    pub async fn create_page(&self, title: &str, content: &str) -> Result<PageId, StoreError> {
        let mut pages = self.pages.write().await;

        if pages.by_id.values().any(|p| p.title == title) {
            return Err(StoreError::DuplicateName(title.to_string()));
        }

        let id = pages.next_id;
        pages.next_id += 1;
        pages.by_id.insert(
            id,
            StoredPage {
                id,
                title: title.to_string(),
                content: content.to_string(),
            },
        );
        Ok(id)
    }

    pub async fn save_page(&self, id: PageId, content: &str) -> Result<(), StoreError> {
        let mut pages = self.pages.write().await;
        let page = pages.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        page.content = content.to_string();
        Ok(())
    }

    pub async fn delete_page(&self, id: PageId) -> Result<(), StoreError> {
        let mut pages = self.pages.write().await;
        pages
            .by_id
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
