//! API routes

mod auth;
mod health;
pub mod metrics;
pub mod pagination;
mod types;
mod users;
pub mod validation;

#[cfg(test)]
mod tests;

use axum::Router;
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .with_state(state);

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
