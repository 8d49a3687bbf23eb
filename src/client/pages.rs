//! HTTP client for the page store API.

use reqwest::{Client, Response};
use tracing::debug;
use wiki_types::page::{
    CreatePageRequest, CreatePageResponse, PageListResponse, PageResponse, StatusResponse,
    UpdatePageRequest,
};
use wiki_types::{Page, PageId, PageSummary};

use super::identity::ClientIdentity;

#[derive(Debug, thiserror::Error)]
pub enum PageClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; `message` is the server's `error` field when present.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The operation needs a saved page but the open page is a draft.
    #[error("page has not been saved yet")]
    Draft,
}

#[derive(Clone)]
pub struct PageClient {
    client: Client,
    server: String,
}

impl PageClient {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            server: server.into().trim_end_matches('/').to_string(),
        }
    }

    fn pages_url(&self) -> String {
        format!("{}/api/pages", self.server)
    }

    fn page_url(&self, id: PageId) -> String {
        format!("{}/api/pages/{}", self.server, id)
    }

    pub async fn list_pages(&self) -> Result<Vec<PageSummary>, PageClientError> {
        let resp = check(self.client.get(self.pages_url()).send().await?).await?;
        let body: PageListResponse = resp.json().await?;
        Ok(body.pages)
    }

    pub async fn get_page(&self, id: PageId) -> Result<Page, PageClientError> {
        let resp = check(self.client.get(self.page_url(id)).send().await?).await?;
        let body: PageResponse = resp.json().await?;
        Ok(body.page)
    }

    pub async fn create_page(&self, title: &str, markdown: &str) -> Result<PageId, PageClientError> {
        let request = CreatePageRequest {
            title: title.to_string(),
            markdown: markdown.to_string(),
        };
        let resp = check(
            self.client
                .post(self.pages_url())
                .json(&request)
                .send()
                .await?,
        )
        .await?;
        let body: CreatePageResponse = resp.json().await?;
        debug!(page_id = body.id, "Created page");
        Ok(body.id)
    }

    /// Save markdown, tagging the save with this editor's identity.
    pub async fn update_page(
        &self,
        id: PageId,
        markdown: &str,
        client: &ClientIdentity,
    ) -> Result<(), PageClientError> {
        let request = UpdatePageRequest {
            markdown: markdown.to_string(),
            client: Some(client.as_str().to_string()),
        };
        check(
            self.client
                .put(self.page_url(id))
                .json(&request)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    pub async fn delete_page(&self, id: PageId) -> Result<(), PageClientError> {
        check(self.client.delete(self.page_url(id)).send().await?).await?;
        Ok(())
    }
}

/// Turn a non-success response into `PageClientError::Server`.
async fn check(resp: Response) -> Result<Response, PageClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StatusResponse>(&text)
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| format!("{} {}", status, text));
    Err(PageClientError::Server {
        status: status.as_u16(),
        message,
    })
}
