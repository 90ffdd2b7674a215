//! userhub database layer
//!
//! This crate provides the user store for userhub, using SQLite via sqlx
//! for persistence. The unique index on `users.email` is the only
//! concurrency control the service relies on.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::{Database, SortField, SortKey, UserFilter};

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
