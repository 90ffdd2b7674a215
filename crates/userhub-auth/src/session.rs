//! Session issuance, verification and revocation
//!
//! A session is a signed token paired with a token cache entry. The signature
//! guards the claims; the cache entry decides whether the session is still
//! alive, so deleting it revokes the token before its `exp`. Issued tokens are
//! tracked per user id so that deleting an account can end all its sessions.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use userhub_db::UserProjection;

use crate::cache::TokenCache;
use crate::error::AuthError;
use crate::jwt::JwtManager;

/// Issues, verifies and revokes cache-bound access tokens
#[derive(Clone)]
pub struct SessionManager {
    jwt: JwtManager,
    cache: Arc<dyn TokenCache>,
}

impl SessionManager {
    pub fn new(jwt: JwtManager, cache: Arc<dyn TokenCache>) -> Self {
        Self { jwt, cache }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.jwt.token_ttl_secs())
    }

    /// Sign a token for `user` and record it in the token cache
    pub async fn issue(&self, user: &UserProjection) -> Result<String, AuthError> {
        let token = self.jwt.generate_token(user)?;
        let value = serde_json::to_string(user)?;

        let ttl = self.ttl();
        self.cache.set(&token, value, ttl).await.map_err(|e| {
            error!(user_id = %user.id, error = %e, "Failed to cache issued token");
            AuthError::TokenCachingFailed(e)
        })?;
        self.cache.track(&user.id, &token, ttl).await.map_err(|e| {
            error!(user_id = %user.id, error = %e, "Failed to track issued token");
            AuthError::TokenCachingFailed(e)
        })?;

        debug!("Issued session for user: {}", user.email);
        Ok(token)
    }

    /// Resolve a presented token to the user it was issued for
    pub async fn verify(&self, token: Option<&str>) -> Result<UserProjection, AuthError> {
        let outcome = self.verify_inner(token).await;
        let label = match &outcome {
            Ok(_) => "valid",
            Err(AuthError::MissingToken) => "missing",
            Err(AuthError::InvalidToken) => "invalid",
            Err(AuthError::TokenExpired) => "expired",
            Err(_) => "error",
        };
        metrics::counter!("userhub_token_verifications_total", "outcome" => label).increment(1);
        outcome
    }

    async fn verify_inner(&self, token: Option<&str>) -> Result<UserProjection, AuthError> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(AuthError::MissingToken),
        };

        let claims = self.jwt.validate_token(token)?;

        let cached = self.cache.get(token).await.map_err(|e| {
            error!(error = %e, "Token cache lookup failed");
            AuthError::CacheUnavailable(e)
        })?;

        let Some(cached) = cached else {
            debug!("No cache entry for token of user: {}", claims.email);
            return Err(AuthError::TokenExpired);
        };

        let user: UserProjection = match serde_json::from_str(&cached) {
            Ok(user) => user,
            Err(e) => {
                debug!("Unreadable cache entry for user {}: {}", claims.email, e);
                return Err(AuthError::TokenExpired);
            }
        };

        if user.id != claims.id || user.email != claims.email {
            debug!("Token claims do not match cached session for: {}", claims.email);
            return Err(AuthError::TokenExpired);
        }

        Ok(user)
    }

    /// Delete the cache entry behind `token`
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let existed = self.cache.delete(token).await.map_err(|e| {
            error!(error = %e, "Failed to delete token from cache");
            AuthError::RevocationFailed(e)
        })?;

        if existed {
            info!("Revoked session token");
        }
        Ok(())
    }

    /// Delete every cached token issued to `user_id`
    ///
    /// Returns how many live sessions were removed.
    pub async fn revoke_user(&self, user_id: &str) -> Result<usize, AuthError> {
        let tokens = self.cache.take_tracked(user_id).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to list sessions of user");
            AuthError::RevocationFailed(e)
        })?;

        let mut revoked = 0;
        for token in &tokens {
            let existed = self.cache.delete(token).await.map_err(|e| {
                error!(user_id = %user_id, error = %e, "Failed to delete token from cache");
                AuthError::RevocationFailed(e)
            })?;
            if existed {
                revoked += 1;
            }
        }

        info!("Revoked {} session(s) of user {}", revoked, user_id);
        Ok(revoked)
    }
}
