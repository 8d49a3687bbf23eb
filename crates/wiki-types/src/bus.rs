//! Event bus frames exchanged over the `/eventbus` WebSocket.
//!
//! Frames are JSON text messages tagged by `type`. Clients send `send`,
//! `publish`, `register`, `unregister` and `ping`; the server answers with
//! `rec`, `err` and `pong`.

use crate::page::PageId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// URL path of the event bus endpoint.
pub const EVENTBUS_PATH: &str = "/eventbus";

/// Request/reply address of the markdown renderer.
pub const MARKDOWN_ADDRESS: &str = "app.markdown";

/// Topic carrying [`SaveNotification`]s.
pub const PAGE_SAVED_ADDRESS: &str = "page.saved";

/// Frame sent from a client to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Send {
        address: String,
        #[serde(default)]
        body: Value,
        #[serde(
            rename = "replyAddress",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        reply_address: Option<String>,
    },
    Publish {
        address: String,
        #[serde(default)]
        body: Value,
    },
    Register {
        address: String,
    },
    Unregister {
        address: String,
    },
    Ping,
}

/// Frame sent from the bus to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A reply (addressed to a reply address) or a topic delivery.
    Rec { address: String, body: Value },
    Err {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        #[serde(rename = "failureCode")]
        failure_code: i32,
        #[serde(rename = "failureType")]
        failure_type: FailureType,
        message: String,
    },
    Pong,
}

impl ServerFrame {
    pub fn error(
        address: Option<String>,
        failure_type: FailureType,
        message: impl Into<String>,
    ) -> Self {
        ServerFrame::Err {
            address,
            failure_code: failure_type.code(),
            failure_type,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    NoHandlers,
    RecipientFailure,
    AccessDenied,
    BadFrame,
}

impl FailureType {
    pub fn code(self) -> i32 {
        match self {
            FailureType::NoHandlers => 1,
            FailureType::RecipientFailure => 2,
            FailureType::AccessDenied => 3,
            FailureType::BadFrame => 4,
        }
    }
}

/// Body of a `page.saved` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveNotification {
    pub id: PageId,
    /// Client tag of the saver; empty when the save did not carry one
    #[serde(default)]
    pub client: String,
}
