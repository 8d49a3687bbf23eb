//! Service layer for business logic.

pub mod page;

pub use page::{PageService, ServiceError};
