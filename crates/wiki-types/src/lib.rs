//! Shared wire types for the live-wiki server and editor.

pub mod bus;
pub mod page;

pub use bus::{ClientFrame, FailureType, SaveNotification, ServerFrame};
pub use page::{Page, PageId, PageSummary};
