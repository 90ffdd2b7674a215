//! User management routes

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use tracing::{debug, error, info, warn};
use userhub_auth::CredentialStore;
use userhub_db::utils::upper_first;
use userhub_db::{DbError, NewUser, User, UserFilter, UserProjection, UserRole};

use crate::error::{ApiError, FieldError};
use crate::state::AppState;

use super::auth::{RequireAuth, RequireOwnerOrAdmin, token_headers};
use super::pagination::{PageLinks, PageRequest, parse_sort_by};
use super::types::{ChangePasswordRequest, ListUsersQuery, RegisterRequest, UpdateUserRequest};
use super::validation::{ApiJson, ApiQuery, FieldChecks, UserIdPath};

fn not_found(user_id: &str) -> ApiError {
    ApiError::NotFound(format!("No record found for user with user id [{}]", user_id))
}

/// Load a user or fail with 404
async fn load_user(state: &AppState, user_id: &str, context: &str) -> Result<User, ApiError> {
    state
        .db
        .find_by_id(user_id)
        .await
        .map_err(|e| ApiError::runtime(format!("{} for user id [{}]", context, user_id), e))?
        .ok_or_else(|| {
            debug!("No record found for user id: {}", user_id);
            not_found(user_id)
        })
}

// ==================== User Routes ====================

/// POST /api/user
async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let mut checks = FieldChecks::new("registration_body");
    checks
        .email("email", &request.email)
        .name("first_name", &request.first_name)
        .name("last_name", &request.last_name)
        .password("password", &request.password);
    let dob = checks.dob("dob", &request.dob);
    checks.finish()?;
    let Some(dob) = dob else {
        return Err(ApiError::validation("Request validation failed", Vec::new()));
    };

    info!("User registration request for email address: {}", request.email);

    let mut user = User::new(NewUser {
        email: request.email.clone(),
        first_name: upper_first(&request.first_name),
        last_name: upper_first(&request.last_name),
        dob,
        role: UserRole::User,
    });
    user.set_password(&request.password);

    let user = state.db.save(&user, false).await.map_err(|e| match e {
        DbError::Duplicate(_) => {
            warn!("Registration with an existing email address: {}", request.email);
            ApiError::duplicate_email("registration_body")
        }
        other => ApiError::runtime(
            format!(
                "An error occurred during registering user with email address [{}]",
                request.email
            ),
            other,
        ),
    })?;

    let projection = user.projection();
    let token = state.sessions.issue(&projection).await?;

    info!("Registered user {} ({})", projection.id, projection.email);
    Ok((StatusCode::CREATED, token_headers(&token)?, Json(projection)).into_response())
}

/// GET /api/user
async fn list_users(
    RequireAuth(_caller): RequireAuth,
    State(state): State<AppState>,
    uri: Uri,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<Response, ApiError> {
    let page = PageRequest::from_query(query.page, query.items_per_page)?;
    let sort = parse_sort_by(query.sort_by.as_deref())?;
    let filter = UserFilter {
        id: None,
        email: query.email,
        first_name: query.first_name.as_deref().map(upper_first),
        last_name: query.last_name.as_deref().map(upper_first),
    };

    debug!("Listing users: {:?} page {:?}", filter, page);

    let (total, users) = tokio::try_join!(
        state.db.count(&filter),
        state.db.paginate(&filter, &sort, page.page, page.items_per_page)
    )
    .map_err(|e| ApiError::runtime("An error occurred while retrieving registered users list", e))?;

    let links = serde_json::to_string(&PageLinks::build(&uri, page, total))
        .map_err(|e| ApiError::runtime("An error occurred while building page links", e))?;
    let mut headers = HeaderMap::new();
    headers.insert("x-items-count", HeaderValue::from(total));
    headers.insert(
        "x-page-links",
        HeaderValue::from_str(&links)
            .map_err(|e| ApiError::runtime("An error occurred while building page links", e))?,
    );

    if users.is_empty() {
        debug!("No users on page {}", page.page);
        return Ok((StatusCode::NO_CONTENT, headers).into_response());
    }

    let body: Vec<UserProjection> = users.iter().map(User::projection).collect();
    Ok((headers, Json(body)).into_response())
}

/// GET /api/user/{user_id}
async fn get_user(
    RequireAuth(_caller): RequireAuth,
    State(state): State<AppState>,
    UserIdPath(user_id): UserIdPath,
) -> Result<Json<UserProjection>, ApiError> {
    let user = load_user(
        &state,
        &user_id,
        "An error occurred while retrieving the user detail",
    )
    .await?;

    Ok(Json(user.projection()))
}

/// PUT /api/user/{user_id}
async fn update_user(
    RequireOwnerOrAdmin(_caller): RequireOwnerOrAdmin,
    State(state): State<AppState>,
    UserIdPath(user_id): UserIdPath,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserProjection>, ApiError> {
    if request.is_empty() {
        warn!("Empty update payload for user id: {}", user_id);
        return Err(ApiError::PreconditionFailed {
            message: "At least one property to be set for user update".to_string(),
            errors: vec![FieldError::new(
                "User request payload have to be set at least one property to update",
                &["update_body"],
            )],
        });
    }

    let mut checks = FieldChecks::new("update_body");
    if let Some(email) = &request.email {
        checks.email("email", email);
    }
    if let Some(first_name) = &request.first_name {
        checks.name("first_name", first_name);
    }
    if let Some(last_name) = &request.last_name {
        checks.name("last_name", last_name);
    }
    let dob = request.dob.as_deref().and_then(|dob| checks.dob("dob", dob));
    checks.finish()?;

    debug!("Updating user: {}", user_id);

    let mut user = load_user(
        &state,
        &user_id,
        "An error occurred while retrieving the user detail to update",
    )
    .await?;

    if let Some(first_name) = &request.first_name {
        user.first_name = upper_first(first_name);
    }
    if let Some(last_name) = &request.last_name {
        user.last_name = upper_first(last_name);
    }
    if let Some(email) = request.email {
        user.email = email;
    }
    if let Some(dob) = dob {
        user.dob = dob;
    }

    let user = state.db.save(&user, true).await.map_err(|e| match e {
        DbError::Duplicate(_) => ApiError::duplicate_email("update_body"),
        DbError::NotFound(_) => not_found(&user_id),
        other => ApiError::runtime(
            format!("An error occurred while updating record for user [{}]", user_id),
            other,
        ),
    })?;

    info!("Updated user: {}", user_id);
    Ok(Json(user.projection()))
}

/// DELETE /api/user/{user_id}
async fn delete_user(
    RequireOwnerOrAdmin(_caller): RequireOwnerOrAdmin,
    State(state): State<AppState>,
    UserIdPath(user_id): UserIdPath,
) -> Result<Json<UserProjection>, ApiError> {
    debug!("Deleting user: {}", user_id);

    let user = state
        .db
        .find_one_and_delete(&UserFilter::by_id(user_id.as_str()))
        .await
        .map_err(|e| {
            ApiError::runtime(
                format!("An error occurred while deleting the user detail for user id [{}]", user_id),
                e,
            )
        })?
        .ok_or_else(|| not_found(&user_id))?;

    // Best effort, the record is already gone.
    if let Err(e) = state.sessions.revoke_user(&user.id).await {
        error!(
            error = %e,
            "Failed to remove the tokens of deleted user {} from cache", user_id
        );
    }

    info!("Deleted user: {}", user_id);
    Ok(Json(user.projection()))
}

/// PUT /api/user/{user_id}/changePassword
async fn change_password(
    RequireOwnerOrAdmin(_caller): RequireOwnerOrAdmin,
    State(state): State<AppState>,
    UserIdPath(user_id): UserIdPath,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<UserProjection>, ApiError> {
    FieldChecks::new("change_password")
        .password_input("current_password", &request.current_password)
        .password("new_password", &request.new_password)
        .finish()?;

    info!("Change password request for user: {}", user_id);

    let mut user = state
        .db
        .find_by_id(&user_id)
        .await
        .map_err(|e| {
            ApiError::runtime(
                format!("An error occurred while retrieving user record for user [{}]", user_id),
                e,
            )
        })?
        .ok_or_else(|| ApiError::NotFound(format!("User not found for user id [{}]", user_id)))?;

    if !user.validate_password(&request.current_password) {
        warn!("Invalid current password while changing password for user: {}", user_id);
        return Err(ApiError::Unauthorized(
            "Credentials does not match. Please try again".to_string(),
        ));
    }

    user.set_password(&request.new_password);
    let user = state.db.save(&user, true).await.map_err(|e| {
        ApiError::runtime(
            format!(
                "An error occurred while updating user's password for user id [{}]",
                user_id
            ),
            e,
        )
    })?;

    info!("Changed password for user: {}", user_id);
    Ok(Json(user.projection()))
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/user", get(list_users).post(register))
        .route(
            "/api/user/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/user/{user_id}/changePassword", put(change_password))
}
