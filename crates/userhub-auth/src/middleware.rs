//! Request authentication for Axum

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::debug;
use userhub_db::UserProjection;

use crate::error::AuthError;
use crate::session::SessionManager;

/// Verified caller, together with the token it presented
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserProjection,
    pub token: String,
}

/// Pull the access token out of the `authorization` header
///
/// Both a bare token and `Bearer <token>` are accepted.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some(("Bearer", rest)) => rest.trim(),
        _ if value == "Bearer" => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<SessionManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionManager>::from_ref(state);
        let token = extract_token(&parts.headers);

        let user = sessions.verify(token).await?;
        debug!("Authenticated user: {} ({})", user.email, user.user_role.as_str());

        Ok(AuthUser {
            user,
            token: token.unwrap_or_default().to_string(),
        })
    }
}
