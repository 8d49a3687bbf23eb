pub mod api;
pub mod bus;
pub mod cli;
pub mod client;
pub mod events;
pub mod page;
pub mod render;
pub mod services;

pub use wiki_types;

use axum::{routing::get, Router};
use bus::EventBus;
use events::BusBroadcaster;
use page::PageStore;
use services::PageService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn health_check() -> &'static str {
    "OK"
}

/// Configuration for creating a router.
pub struct RouterConfig {
    /// Capacity of the topic broadcast channel feeding event bus connections
    pub bus_capacity: usize,
    /// Pre-populated page store (a fresh empty one when `None`)
    pub page_store: Option<Arc<PageStore>>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            page_store: None,
        }
    }
}

/// Create a router with the given configuration.
pub fn create_router_with_config(config: RouterConfig) -> Router {
    let page_store = config
        .page_store
        .unwrap_or_else(|| Arc::new(PageStore::new()));
    let broadcaster = BusBroadcaster::new(config.bus_capacity);

    let service = Arc::new(PageService::new(page_store, broadcaster.clone()));
    let bus = Arc::new(EventBus::wiki(broadcaster));

    Router::new()
        .route("/health", get(health_check))
        .merge(api::router(service))
        .merge(bus::router(bus))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub fn create_router() -> Router {
    create_router_with_config(RouterConfig::default())
}
