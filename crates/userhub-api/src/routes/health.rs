//! Health and status endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

use super::types::MessageResponse;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/status
async fn status() -> Json<MessageResponse> {
    metrics::counter!("userhub_status_checks_total").increment(1);

    Json(MessageResponse::new("System is working fine"))
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
}
