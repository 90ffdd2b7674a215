//! Request/Response DTOs

use serde::{Deserialize, Serialize};

// ==================== Auth Types ====================

/// Login request
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Plain confirmation message
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ==================== User Types ====================

/// Registration request
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: String,
    pub password: String,
}

/// Partial profile update
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.dob.is_none()
    }
}

/// Change password request
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Query string of the user listing
#[derive(Deserialize, Default)]
pub struct ListUsersQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: Option<u32>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

/// `user_id` path segment
#[derive(Deserialize)]
pub struct UserIdParam {
    pub user_id: String,
}
