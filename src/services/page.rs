//! Page service layer.
//!
//! Business logic for page operations, kept apart from HTTP handler
//! concerns. The service orchestrates between the PageStore, the markdown
//! renderer and the BusBroadcaster.

use std::sync::Arc;

use tracing::debug;
use wiki_types::{Page, PageId, PageSummary, SaveNotification};

use crate::events::BusBroadcaster;
use crate::page::{PageStore, StoreError};
use crate::render::render_markdown;

/// Errors that can occur in service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Page not found
    #[error("There is no page with ID {0}")]
    NotFound(PageId),
    /// Invalid input data
    #[error("{0}")]
    InvalidInput(String),
    /// Conflict (e.g., duplicate page title)
    #[error("{0}")]
    Conflict(String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::DuplicateName(_) => ServiceError::Conflict(e.to_string()),
        }
    }
}

/// Service for page operations.
pub struct PageService {
    store: Arc<PageStore>,
    broadcaster: BusBroadcaster,
}

impl PageService {
    pub fn new(store: Arc<PageStore>, broadcaster: BusBroadcaster) -> Self {
        Self { store, broadcaster }
    }

    pub async fn list_pages(&self) -> Vec<PageSummary> {
        self.store
            .all_pages_data()
            .await
            .into_iter()
            .map(PageSummary::from)
            .collect()
    }

    /// Fetch a page with its HTML rendering inline.
    pub async fn get_page(&self, id: PageId) -> Result<Page, ServiceError> {
        let stored = self
            .store
            .get_page(id)
            .await
            .ok_or(ServiceError::NotFound(id))?;

        Ok(Page {
            id: Some(stored.id),
            html: render_markdown(&stored.content),
            name: stored.title,
            markdown: stored.content,
        })
    }

    pub async fn create_page(&self, title: &str, markdown: &str) -> Result<PageId, ServiceError> {
        if title.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Page title must not be empty".to_string(),
            ));
        }

        let id = self.store.create_page(title, markdown).await?;
        debug!(page_id = id, title = %title, "Page created");
        Ok(id)
    }

    /// Store new markdown and announce the save on `page.saved`.
    ///
    /// The notification carries `client` verbatim so editors can tell
    /// their own saves apart from everyone else's.
    pub async fn save_page(
        &self,
        id: PageId,
        markdown: &str,
        client: Option<String>,
    ) -> Result<(), ServiceError> {
        self.store.save_page(id, markdown).await?;

        let notification = SaveNotification {
            id,
            client: client.unwrap_or_default(),
        };
        debug!(page_id = id, client = %notification.client, "Page saved");
        self.broadcaster.notify_page_saved(&notification);
        Ok(())
    }

    pub async fn delete_page(&self, id: PageId) -> Result<(), ServiceError> {
        self.store.delete_page(id).await?;
        debug!(page_id = id, "Page deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiki_types::bus::PAGE_SAVED_ADDRESS;

    fn service() -> (PageService, BusBroadcaster) {
        let broadcaster = BusBroadcaster::new(16);
        (
            PageService::new(Arc::new(PageStore::new()), broadcaster.clone()),
            broadcaster,
        )
    }

    #[tokio::test]
    async fn test_get_page_renders_html() {
        let (service, _) = service();
        let id = service.create_page("Home", "*hi*").await.unwrap();

        let page = service.get_page(id).await.unwrap();
        assert_eq!(page.id, Some(id));
        assert_eq!(page.name, "Home");
        assert_eq!(page.html, "<p><em>hi</em></p>\n");
    }

    #[tokio::test]
    async fn test_save_publishes_notification_with_client_tag() {
        let (service, broadcaster) = service();
        let id = service.create_page("Home", "a").await.unwrap();
        let mut rx = broadcaster.subscribe();

        service
            .save_page(id, "b", Some("client-1".to_string()))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.address, PAGE_SAVED_ADDRESS);
        let note: SaveNotification = serde_json::from_value(event.body).unwrap();
        assert_eq!(
            note,
            SaveNotification {
                id,
                client: "client-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_save_publishes_nothing() {
        let (service, broadcaster) = service();
        let mut rx = broadcaster.subscribe();

        assert!(matches!(
            service.save_page(42, "x", None).await,
            Err(ServiceError::NotFound(42))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let (service, _) = service();
        assert!(matches!(
            service.create_page("  ", "x").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
