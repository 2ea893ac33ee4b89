pub mod config;
pub mod counter;
pub mod error;
pub mod handlers;
pub mod models;
pub mod resolve;
pub mod store;

use std::sync::Arc;

use store::GolinkStore;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<dyn GolinkStore>,
    pub config: config::AppConfig,
}
