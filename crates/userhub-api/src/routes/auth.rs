//! Authentication extractors and routes

use axum::{
    Json, Router,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, HeaderValue, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{debug, info, warn};
use userhub_auth::{AccessPolicy, AuthError, AuthUser, CredentialStore, authorize};
use userhub_db::{UserFilter, UserProjection};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{LoginRequest, MessageResponse};
use super::validation::{ApiJson, FieldChecks, UserIdPath};

// ==================== Auth Extractors ====================

/// Any caller holding a live session
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let caller = AuthUser::from_request_parts(parts, &app_state).await?;

        authorize(AccessPolicy::Authenticated, &caller.user, None)?;
        Ok(RequireAuth(caller))
    }
}

/// The user addressed by `{user_id}`, or an admin
pub struct RequireOwnerOrAdmin(pub AuthUser);

impl<S> FromRequestParts<S> for RequireOwnerOrAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let caller = AuthUser::from_request_parts(parts, &app_state).await?;

        let UserIdPath(owner) = UserIdPath::from_request_parts(parts, state).await?;

        authorize(AccessPolicy::OwnerOrAdmin, &caller.user, Some(owner.as_str()))?;
        Ok(RequireOwnerOrAdmin(caller))
    }
}

/// Response headers carrying a freshly issued token
pub fn token_headers(token: &str) -> Result<HeaderMap, ApiError> {
    let value = HeaderValue::from_str(token)
        .map_err(|e| ApiError::runtime("An error occurred during generating the jwt token", e))?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

// ==================== Auth Routes ====================

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    FieldChecks::new("credentials")
        .email("email", &request.email)
        .password_input("password", &request.password)
        .finish()?;

    let email = request.email;
    debug!("Login attempt for email address: {}", email);

    let user = state
        .db
        .find_one(&UserFilter::by_email(email.as_str()))
        .await
        .map_err(|e| {
            ApiError::runtime(
                format!("An error occurred while retrieving user detail for email address [{}]", email),
                e,
            )
        })?;

    let Some(user) = user else {
        metrics::counter!("userhub_logins_total", "outcome" => "unknown_user").increment(1);
        debug!("User not found with email address: {}", email);
        return Err(ApiError::NotFound(format!(
            "User not found with email address [{}]",
            email
        )));
    };

    if !user.validate_password(&request.password) {
        metrics::counter!("userhub_logins_total", "outcome" => "bad_password").increment(1);
        warn!("Login with incorrect password for email address: {}", email);
        return Err(AuthError::InvalidCredentials.into());
    }

    let projection: UserProjection = user.projection();
    let token = state.sessions.issue(&projection).await?;

    metrics::counter!("userhub_logins_total", "outcome" => "success").increment(1);
    info!("User {} logged in successfully", email);

    Ok((token_headers(&token)?, Json(projection)))
}

/// GET|POST /api/logout
async fn logout(
    RequireAuth(caller): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    debug!("Logout requested by user: {}", caller.user.id);

    state.sessions.revoke(&caller.token).await?;

    info!("User {} logged out", caller.user.id);
    Ok(Json(MessageResponse::new("User successfully logout from system")))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", get(logout).post(logout))
}
