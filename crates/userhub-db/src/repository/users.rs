//! User operations

use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;

use crate::error::DbError;
use crate::models::{DATE_FORMAT, User};
use crate::repository::Database;

const USER_COLUMNS: &str =
    "id, email, salt, hash, first_name, last_name, dob, user_role, created_at, updated_at, version";

/// Exact-match filter over user records; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    /// Build the WHERE clause and its positional parameters
    fn where_clause(&self) -> (String, Vec<&str>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        let fields = [
            ("id", &self.id),
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                conditions.push(format!("{} = ?", column));
                params.push(value.as_str());
            }
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, params)
    }
}

/// Sortable user columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    FirstName,
    LastName,
    Email,
    Dob,
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::FirstName => "first_name",
            SortKey::LastName => "last_name",
            SortKey::Email => "email",
            SortKey::Dob => "dob",
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_name" => Ok(SortKey::FirstName),
            "last_name" => Ok(SortKey::LastName),
            "email" => Ok(SortKey::Email),
            "dob" => Ok(SortKey::Dob),
            "created_at" | "createdAt" => Ok(SortKey::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortKey::UpdatedAt),
            _ => Err(format!("Unsupported sort field: {}", s)),
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub key: SortKey,
    pub descending: bool,
}

impl SortField {
    pub fn asc(key: SortKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    pub fn desc(key: SortKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }
}

/// `-field` sorts descending, `field` ascending
impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('-') {
            Some(rest) => Ok(SortField::desc(rest.parse()?)),
            None => Ok(SortField::asc(s.parse()?)),
        }
    }
}

fn order_by_clause(sort: &[SortField]) -> String {
    let mut terms: Vec<String> = sort
        .iter()
        .map(|f| {
            format!(
                "{} {}",
                f.key.column(),
                if f.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    if terms.is_empty() {
        terms.push("created_at ASC".to_string());
    }
    // Stable order across pages
    terms.push("id ASC".to_string());
    format!("ORDER BY {}", terms.join(", "))
}

impl Database {
    // ==================== User Operations ====================

    /// Find the first user matching the filter
    pub async fn find_one(&self, filter: &UserFilter) -> Result<Option<User>, DbError> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!("SELECT {} FROM users {} LIMIT 1", USER_COLUMNS, where_clause);

        let mut query = sqlx::query(&sql);
        for param in params {
            query = query.bind(param);
        }
        let result = query.fetch_optional(&self.pool).await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        self.find_one(&UserFilter::by_id(id)).await
    }

    /// Insert (`is_update == false`) or update a user, returning the stored record
    ///
    /// Updates bump `version` and `updated_at`. A clash on the email index
    /// surfaces as [`DbError::Duplicate`] in both modes.
    pub async fn save(&self, user: &User, is_update: bool) -> Result<User, DbError> {
        let duplicate_msg = || format!("User with email '{}' already exists", user.email);

        if !is_update {
            sqlx::query(
                r#"
                INSERT INTO users (id, email, salt, hash, first_name, last_name, dob, user_role, created_at, updated_at, version)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.salt)
            .bind(&user.hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.dob.format(DATE_FORMAT).to_string())
            .bind(user.role.as_str())
            .bind(user.created_at.to_rfc3339())
            .bind(user.updated_at.to_rfc3339())
            .bind(user.version)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from_write(e, &duplicate_msg()))?;

            return Ok(user.clone());
        }

        let sql = format!(
            r#"
            UPDATE users
            SET email = ?, salt = ?, hash = ?, first_name = ?, last_name = ?, dob = ?,
                user_role = ?, updated_at = ?, version = version + 1
            WHERE id = ?
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&user.email)
            .bind(&user.salt)
            .bind(&user.hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.dob.format(DATE_FORMAT).to_string())
            .bind(user.role.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&user.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError::from_write(e, &duplicate_msg()))?
            .ok_or_else(|| DbError::NotFound(format!("User: {}", user.id)))?;

        Ok(User::try_from(&row)?)
    }

    /// Delete the first user matching the filter and return it
    pub async fn find_one_and_delete(&self, filter: &UserFilter) -> Result<Option<User>, DbError> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!(
            "DELETE FROM users WHERE id = (SELECT id FROM users {} LIMIT 1) RETURNING {}",
            where_clause, USER_COLUMNS
        );

        let mut query = sqlx::query(&sql);
        for param in params {
            query = query.bind(param);
        }
        let result = query.fetch_optional(&self.pool).await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Count users matching the filter
    pub async fn count(&self, filter: &UserFilter) -> Result<i64, DbError> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) as count FROM users {}", where_clause);

        let mut query = sqlx::query(&sql);
        for param in params {
            query = query.bind(param);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.get("count"))
    }

    /// Fetch one page of users; `page` is 1-based
    pub async fn paginate(
        &self,
        filter: &UserFilter,
        sort: &[SortField],
        page: u32,
        page_size: u32,
    ) -> Result<Vec<User>, DbError> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!(
            "SELECT {} FROM users {} {} LIMIT ? OFFSET ?",
            USER_COLUMNS,
            where_clause,
            order_by_clause(sort)
        );
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);

        let mut query = sqlx::query(&sql);
        for param in params {
            query = query.bind(param);
        }
        query = query.bind(i64::from(page_size)).bind(offset);

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        Ok(self.count(&UserFilter::default()).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, UserRole};
    use chrono::NaiveDate;

    fn new_user(email: &str, first_name: &str, last_name: &str) -> User {
        let mut user = User::new(NewUser {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 15).unwrap(),
            role: UserRole::User,
        });
        user.salt = "00".repeat(16);
        user.hash = "11".repeat(64);
        user
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::in_memory().await.unwrap();
        let user = db.save(&new_user("a@x.com", "Ann", "Lee"), false).await.unwrap();

        let by_id = db.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");
        assert_eq!(by_id.dob, NaiveDate::from_ymd_opt(1990, 1, 15).unwrap());
        assert_eq!(by_id.version, 0);

        let by_email = db.find_one(&UserFilter::by_email("a@x.com")).await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));

        assert!(db.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_distinguished() {
        let db = Database::in_memory().await.unwrap();
        db.save(&new_user("a@x.com", "Ann", "Lee"), false).await.unwrap();

        let err = db
            .save(&new_user("a@x.com", "Bob", "Ray"), false)
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_detects_duplicates() {
        let db = Database::in_memory().await.unwrap();
        let mut ann = db.save(&new_user("a@x.com", "Ann", "Lee"), false).await.unwrap();
        db.save(&new_user("b@x.com", "Bob", "Ray"), false).await.unwrap();

        ann.first_name = "Annie".to_string();
        let updated = db.save(&ann, true).await.unwrap();
        assert_eq!(updated.first_name, "Annie");
        assert_eq!(updated.version, 1);
        assert!(updated.updated_at >= ann.updated_at);

        let mut clash = updated.clone();
        clash.email = "b@x.com".to_string();
        assert!(db.save(&clash, true).await.unwrap_err().is_duplicate());

        let ghost = new_user("ghost@x.com", "Gus", "Host");
        assert!(matches!(
            db.save(&ghost, true).await.unwrap_err(),
            DbError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_find_one_and_delete() {
        let db = Database::in_memory().await.unwrap();
        let user = db.save(&new_user("a@x.com", "Ann", "Lee"), false).await.unwrap();

        let deleted = db
            .find_one_and_delete(&UserFilter::by_id(user.id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(deleted.email, "a@x.com");
        assert!(db.find_by_id(&user.id).await.unwrap().is_none());

        let again = db
            .find_one_and_delete(&UserFilter::by_id(user.id))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_count_and_paginate_with_sort() {
        let db = Database::in_memory().await.unwrap();
        for (email, first, last) in [
            ("c@x.com", "Cara", "Lee"),
            ("a@x.com", "Ann", "Lee"),
            ("b@x.com", "Bob", "Ray"),
            ("d@x.com", "Ann", "Zed"),
        ] {
            db.save(&new_user(email, first, last), false).await.unwrap();
        }

        assert_eq!(db.count(&UserFilter::default()).await.unwrap(), 4);
        let lees = UserFilter {
            last_name: Some("Lee".to_string()),
            ..Default::default()
        };
        assert_eq!(db.count(&lees).await.unwrap(), 2);

        let sort = [SortField::asc(SortKey::FirstName), SortField::desc(SortKey::LastName)];
        let page1 = db.paginate(&UserFilter::default(), &sort, 1, 3).await.unwrap();
        let emails: Vec<_> = page1.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["d@x.com", "a@x.com", "b@x.com"]);

        let page2 = db.paginate(&UserFilter::default(), &sort, 2, 3).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].email, "c@x.com");

        let page3 = db.paginate(&UserFilter::default(), &sort, 3, 3).await.unwrap();
        assert!(page3.is_empty());
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!(
            "-last_name".parse::<SortField>().unwrap(),
            SortField::desc(SortKey::LastName)
        );
        assert_eq!(
            "first_name".parse::<SortField>().unwrap(),
            SortField::asc(SortKey::FirstName)
        );
        assert!("salt".parse::<SortField>().is_err());
    }
}
