//! Prometheus scrape endpoint

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tracing::trace;

use crate::state::MetricsHandle;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Routes exposing the recorder behind `handle`
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(handle)
}

/// GET /metrics
async fn scrape(State(handle): State<Arc<MetricsHandle>>) -> Response {
    // Drain histogram buckets before rendering.
    handle.run_upkeep();
    let body = handle.render();
    trace!("Rendered {} bytes of metrics", body.len());

    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(PROMETHEUS_TEXT));
    response
}
