//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::cache::CacheError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Access token not found")]
    MissingToken,

    #[error("Invalid access token found")]
    InvalidToken,

    #[error("Given token has been expired")]
    TokenExpired,

    #[error("Invalid user credentials found")]
    InvalidCredentials,

    #[error("Access denied for a specific route")]
    AccessDenied,

    #[error("Token cache unavailable: {0}")]
    CacheUnavailable(CacheError),

    #[error("Failed to cache token: {0}")]
    TokenCachingFailed(CacheError),

    #[error("Failed to revoke token: {0}")]
    RevocationFailed(CacheError),

    #[error("Failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Token lifetime of {0} seconds is out of range")]
    TokenLifetime(u64),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccessDenied => StatusCode::FORBIDDEN,
            AuthError::CacheUnavailable(_)
            | AuthError::TokenCachingFailed(_)
            | AuthError::RevocationFailed(_)
            | AuthError::Serialization(_)
            | AuthError::Jwt(_)
            | AuthError::TokenLifetime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            StatusCode::FORBIDDEN => "FORBIDDEN",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message that is safe to hand back to the caller
    ///
    /// Backend details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::CacheUnavailable(_) => {
                "An error occurred while verifying the access token".to_string()
            }
            AuthError::TokenCachingFailed(_)
            | AuthError::Serialization(_)
            | AuthError::Jwt(_)
            | AuthError::TokenLifetime(_) => {
                "An error occurred during generating the jwt token".to_string()
            }
            AuthError::RevocationFailed(_) => {
                "An error occurred while logout from system".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.status_code().is_server_error() {
            tracing::error!("Authentication failure: {}", self);
        }

        let body = axum::Json(json!({
            "code": self.code(),
            "message": self.public_message(),
        }));

        (self.status_code(), body).into_response()
    }
}
