//! User domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles assigned to a freshly registered user.
pub const DEFAULT_ROLES: &[&str] = &["user"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    Deleted,
}

/// The authoritative account record held by the data service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string. Only set when no identity provider owns the
    /// credentials.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub status: UserStatus,
    pub roles: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
    /// Identity id of the creator, used by owner-based rules.
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateUser {
    /// Explicit record id. `None` generates a fresh one.
    pub id: Option<Uuid>,
    pub username: String,
    pub email: String,
    /// Raw password (will be hashed with Argon2id before storage).
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub profile_picture: Option<String>,
    pub status: Option<UserStatus>,
    /// `None` stores [`DEFAULT_ROLES`].
    pub roles: Option<Vec<String>>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub birth_date: Option<Option<NaiveDate>>,
    pub profile_picture: Option<Option<String>>,
    pub status: Option<UserStatus>,
    pub roles: Option<Vec<String>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Filter predicate for user list queries. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserFilter {
    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }
}
