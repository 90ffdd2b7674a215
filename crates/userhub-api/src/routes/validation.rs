//! Request validation and validating extractors

use axum::extract::{FromRequest, FromRequestParts, Path, Query};
use chrono::{NaiveDate, Utc};
use userhub_db::DATE_FORMAT;
use uuid::Uuid;

use crate::error::{ApiError, FieldError};

use super::types::UserIdParam;

/// Maximum allowed first/last name length
pub const MAX_NAME_LENGTH: usize = 64;
/// Minimum allowed password length
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum allowed password length (prevent DoS with very large passwords)
pub const MAX_PASSWORD_LENGTH: usize = 256;
/// Maximum allowed email length
pub const MAX_EMAIL_LENGTH: usize = 254;

// ==================== Extractors ====================

/// JSON body whose rejections use the API error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections use the API error format
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `user_id` path parameter, checked to be a UUID
pub struct UserIdPath(pub String);

impl<S> FromRequestParts<S> for UserIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Path(param) = Path::<UserIdParam>::from_request_parts(parts, state).await?;

        if Uuid::parse_str(&param.user_id).is_err() {
            return Err(ApiError::validation(
                "Request validation failed",
                vec![FieldError::new("user_id must be a valid UUID", &["user_id"])],
            ));
        }

        Ok(UserIdPath(param.user_id))
    }
}

// ==================== Field checks ====================

/// Collects field errors for one request body
pub struct FieldChecks {
    root: &'static str,
    errors: Vec<FieldError>,
}

impl FieldChecks {
    pub fn new(root: &'static str) -> Self {
        Self {
            root,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, message: String) {
        self.errors.push(FieldError::new(message, &[self.root, field]));
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_valid_email(value) {
            self.fail(field, format!("{} must be a valid email address", field));
        }
        self
    }

    pub fn name(&mut self, field: &str, value: &str) -> &mut Self {
        let len = value.trim().chars().count();
        if len == 0 {
            self.fail(field, format!("{} cannot be empty", field));
        } else if value.chars().count() > MAX_NAME_LENGTH {
            self.fail(
                field,
                format!("{} exceeds maximum length of {} characters", field, MAX_NAME_LENGTH),
            );
        }
        self
    }

    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        let len = value.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            self.fail(
                field,
                format!("{} must be at least {} characters long", field, MIN_PASSWORD_LENGTH),
            );
        } else if len > MAX_PASSWORD_LENGTH {
            self.fail(
                field,
                format!("{} exceeds maximum length of {} characters", field, MAX_PASSWORD_LENGTH),
            );
        }
        self
    }

    /// Presence and size only; used where any stored password may be typed
    pub fn password_input(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.fail(field, format!("{} cannot be empty", field));
        } else if value.chars().count() > MAX_PASSWORD_LENGTH {
            self.fail(
                field,
                format!("{} exceeds maximum length of {} characters", field, MAX_PASSWORD_LENGTH),
            );
        }
        self
    }

    /// Parse a date of birth, recording an error when it is malformed or in the future
    pub fn dob(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        match NaiveDate::parse_from_str(value, DATE_FORMAT) {
            Ok(date) if date <= Utc::now().date_naive() => Some(date),
            Ok(_) => {
                self.fail(field, format!("{} cannot be in the future", field));
                None
            }
            Err(_) => {
                self.fail(field, format!("{} must be a date in YYYY-MM-DD format", field));
                None
            }
        }
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ApiError::validation(
            "Request validation failed",
            std::mem::take(&mut self.errors),
        ))
    }
}

/// Loose structural email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}
