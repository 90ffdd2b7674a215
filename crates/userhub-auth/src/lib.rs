//! userhub authentication and authorization
//!
//! Salted password storage, cache-bound JWT sessions that can be revoked
//! before they expire, and the per-route owner-or-admin gate.

pub mod cache;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;

pub use cache::{CacheError, InMemoryTokenCache, TokenCache};
pub use error::AuthError;
pub use gate::{AccessPolicy, authorize};
pub use jwt::{Claims, JwtManager};
pub use middleware::{AuthUser, extract_token};
pub use password::CredentialStore;
pub use session::SessionManager;
