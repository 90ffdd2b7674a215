//! API error types

use std::fmt::Display;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use userhub_auth::AuthError;

/// Default code for request validation failures
pub const FAILED_TO_VALIDATE: &str = "FAILED_TO_VALIDATE";
/// Code for a registration or update that collides with an existing email
pub const EMAIL_ADDRESS_DUPLICATION: &str = "EMAIL_ADDRESS_DUPLICATION";

/// One offending field in a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub path: Vec<String>,
}

impl FieldError {
    pub fn new(message: impl Into<String>, path: &[&str]) -> Self {
        Self {
            message: message.into(),
            path: path.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    PreconditionFailed {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    Runtime(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        ApiError::Validation {
            code: FAILED_TO_VALIDATE,
            message: message.into(),
            errors,
        }
    }

    /// The email is already taken by another user
    pub fn duplicate_email(body: &str) -> Self {
        ApiError::Validation {
            code: EMAIL_ADDRESS_DUPLICATION,
            message: "An email address is already exist in a system, Please try another email address"
                .to_string(),
            errors: vec![FieldError::new(
                "An email address is already register for some other user",
                &[body, "email"],
            )],
        }
    }

    /// Log an infrastructure failure and hide it behind `context`
    pub fn runtime(context: impl Into<String>, source: impl Display) -> Self {
        let context = context.into();
        error!(error = %source, "{}", context);
        ApiError::Runtime(context)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            ApiError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(e) => e.status_code(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text(), Vec::new())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text(), Vec::new())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text(), Vec::new())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message, errors) = match self {
            ApiError::Validation {
                code,
                message,
                errors,
            } => (code, message, errors),
            ApiError::Unauthorized(msg) => ("UNAUTHORIZED", msg, Vec::new()),
            ApiError::Forbidden(msg) => ("FORBIDDEN", msg, Vec::new()),
            ApiError::NotFound(msg) => ("NOT_FOUND", msg, Vec::new()),
            ApiError::PreconditionFailed { message, errors } => {
                ("PRECONDITION_FAILED", message, errors)
            }
            ApiError::Runtime(msg) => ("INTERNAL_SERVER_ERROR", msg, Vec::new()),
            ApiError::Auth(e) => {
                if status.is_server_error() {
                    error!(error = %e, "Authentication failure");
                }
                (e.code(), e.public_message(), Vec::new())
            }
        };

        let body = if errors.is_empty() {
            json!({ "code": code, "message": message })
        } else {
            json!({ "code": code, "message": message, "errors": errors })
        };

        (status, axum::Json(body)).into_response()
    }
}
