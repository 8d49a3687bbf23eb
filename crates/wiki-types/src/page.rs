//! Page records and the JSON bodies of the page-store HTTP API.

use serde::{Deserialize, Serialize};

/// Server-assigned page identifier.
pub type PageId = u64;

/// A wiki page as the editor sees it.
///
/// `id` is `None` while the page is an unsaved draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PageId>,
    pub name: String,
    pub markdown: String,
    /// Rendered HTML of `markdown` (the live preview on the client side)
    #[serde(default)]
    pub html: String,
}

impl Page {
    /// Create an unsaved draft.
    pub fn draft(name: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            markdown: markdown.into(),
            html: String::new(),
        }
    }

    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }
}

/// Entry of the page listing. On the wire the fields are `title`/`content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub id: PageId,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(rename = "content")]
    pub markdown: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    pub markdown: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePageRequest {
    pub markdown: String,
    /// Client tag of the saving editor, echoed in the `page.saved` notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageListResponse {
    pub success: bool,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub success: bool,
    pub page: Page,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePageResponse {
    pub success: bool,
    pub id: PageId,
}

/// Plain `{success}` acknowledgement, optionally with an error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}
