//! userhub REST API
//!
//! Axum routes for registration, login/logout and user management, wired to
//! the session core in `userhub-auth` and the store in `userhub-db`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, FieldError};
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
