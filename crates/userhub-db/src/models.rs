//! Database models

use crate::utils::{parse_date_or_epoch, parse_datetime_or_now};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Calendar date format used for `dob` in storage and in projections
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidUserRole(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidUserRole(s) => write!(f, "Invalid user role: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// User role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "User",
            UserRole::Admin => "Admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl FromStr for UserRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(UserRole::User),
            "Admin" => Ok(UserRole::Admin),
            _ => Err(ParseError::InvalidUserRole(s.to_string())),
        }
    }
}

/// User model
///
/// `salt` and `hash` are only ever written together, by the credential
/// store in `userhub-auth`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub salt: String,
    pub hash: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl User {
    /// Build a fresh, not yet persisted user without credentials.
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: new_user.email,
            salt: String::new(),
            hash: String::new(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            dob: new_user.dob,
            role: new_user.role,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Public view of the user, without salt and hash
    pub fn projection(&self) -> UserProjection {
        UserProjection {
            id: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            dob: self.dob.format(DATE_FORMAT).to_string(),
            user_role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

/// User projection: what callers and the token cache get to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProjection {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub user_role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl UserProjection {
    pub fn is_admin(&self) -> bool {
        self.user_role.is_admin()
    }
}

/// New user (for registration)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub role: UserRole,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let role_str: String = row.try_get("user_role")?;
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            salt: row.try_get("salt")?,
            hash: row.try_get("hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            dob: parse_date_or_epoch(&row.try_get::<String, _>("dob")?),
            role: UserRole::from_str(&role_str).unwrap_or_default(),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
            version: row.try_get("version")?,
        })
    }
}
