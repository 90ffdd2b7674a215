//! Application state

use axum::extract::FromRef;
use std::sync::Arc;
use userhub_auth::SessionManager;
use userhub_db::Database;

/// Prometheus recorder handle used to render `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(db: Database, sessions: Arc<SessionManager>) -> Self {
        Self { db, sessions }
    }
}

impl FromRef<AppState> for Arc<SessionManager> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
