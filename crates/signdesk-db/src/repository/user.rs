//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords (provider-less deployments only) are hashed with Argon2id
//! before they reach the database. An optional pepper can be provided at
//! construction time.

use chrono::{DateTime, NaiveDate, Utc};
use signdesk_core::error::SignDeskResult;
use signdesk_core::models::user::{
    CreateUser, DEFAULT_ROLES, UpdateUser, User, UserFilter, UserStatus,
};
use signdesk_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::password::hash_password;

const BIRTH_DATE_FORMAT: &str = "%Y-%m-%d";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    email: String,
    password_hash: Option<String>,
    first_name: String,
    last_name: String,
    birth_date: Option<String>,
    profile_picture: Option<String>,
    status: String,
    roles: Vec<String>,
    last_login: Option<DateTime<Utc>>,
    owner: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    username: String,
    email: String,
    password_hash: Option<String>,
    first_name: String,
    last_name: String,
    birth_date: Option<String>,
    profile_picture: Option<String>,
    status: String,
    roles: Vec<String>,
    last_login: Option<DateTime<Utc>>,
    owner: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<UserStatus, DbError> {
    match s {
        "active" => Ok(UserStatus::Active),
        "suspended" => Ok(UserStatus::Suspended),
        "deleted" => Ok(UserStatus::Deleted),
        other => Err(DbError::Corrupt(format!("unknown user status: {other}"))),
    }
}

fn status_to_string(s: UserStatus) -> &'static str {
    match s {
        UserStatus::Active => "active",
        UserStatus::Suspended => "suspended",
        UserStatus::Deleted => "deleted",
    }
}

fn parse_birth_date(s: Option<String>) -> Result<Option<NaiveDate>, DbError> {
    s.map(|raw| {
        NaiveDate::parse_from_str(&raw, BIRTH_DATE_FORMAT)
            .map_err(|e| DbError::Corrupt(format!("invalid birth date {raw}: {e}")))
    })
    .transpose()
}

fn format_birth_date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|date| date.format(BIRTH_DATE_FORMAT).to_string())
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: parse_birth_date(self.birth_date)?,
            profile_picture: self.profile_picture,
            status: parse_status(&self.status)?,
            roles: self.roles,
            last_login: self.last_login,
            owner: self.owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        UserRow {
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date,
            profile_picture: self.profile_picture,
            status: self.status,
            roles: self.roles,
            last_login: self.last_login,
            owner: self.owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn filter_clause(filter: &UserFilter) -> String {
    let mut conditions = Vec::new();
    if filter.username.is_some() {
        conditions.push("username = $username");
    }
    if filter.email.is_some() {
        conditions.push("email = $email");
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> SignDeskResult<User> {
        let id = input.id.unwrap_or_else(Uuid::new_v4);
        let id_str = id.to_string();

        let password_hash = input
            .password
            .as_deref()
            .map(|pw| hash_password(pw, self.pepper.as_deref()))
            .transpose()?;

        let roles = input
            .roles
            .unwrap_or_else(|| DEFAULT_ROLES.iter().map(|r| r.to_string()).collect());
        let status = input.status.unwrap_or_default();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email, \
                 password_hash = $password_hash, \
                 first_name = $first_name, last_name = $last_name, \
                 birth_date = $birth_date, \
                 profile_picture = $profile_picture, \
                 status = $status, roles = $roles, \
                 last_login = NONE, owner = $owner",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("birth_date", format_birth_date(input.birth_date)))
            .bind(("profile_picture", input.profile_picture))
            .bind(("status", status_to_string(status).to_string()))
            .bind(("roles", roles))
            .bind(("owner", input.owner))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("user", e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> SignDeskResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_username(&self, username: &str) -> SignDeskResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE username = $username")
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("username={username}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> SignDeskResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.birth_date.is_some() {
            sets.push("birth_date = $birth_date");
        }
        if input.profile_picture.is_some() {
            sets.push("profile_picture = $profile_picture");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.roles.is_some() {
            sets.push("roles = $roles");
        }
        if input.last_login.is_some() {
            sets.push("last_login = $last_login");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('user', $id) SET {}", sets.join(", "));

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        if let Some(birth_date) = input.birth_date {
            builder = builder.bind(("birth_date", format_birth_date(birth_date)));
        }
        if let Some(profile_picture) = input.profile_picture {
            builder = builder.bind(("profile_picture", profile_picture));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }
        if let Some(roles) = input.roles {
            builder = builder.bind(("roles", roles));
        }
        if let Some(last_login) = input.last_login {
            builder = builder.bind(("last_login", last_login));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("user", e.to_string()))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn list(
        &self,
        filter: UserFilter,
        pagination: Pagination,
    ) -> SignDeskResult<PaginatedResult<User>> {
        let where_clause = filter_clause(&filter);

        let count_query = format!("SELECT count() AS total FROM user{where_clause} GROUP ALL");
        let mut count_builder = self.db.query(&count_query);
        if let Some(ref username) = filter.username {
            count_builder = count_builder.bind(("username", username.clone()));
        }
        if let Some(ref email) = filter.email {
            count_builder = count_builder.bind(("email", email.clone()));
        }
        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let select_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user{where_clause} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset"
        );
        let mut builder = self
            .db
            .query(&select_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(username) = filter.username {
            builder = builder.bind(("username", username));
        }
        if let Some(email) = filter.email {
            builder = builder.bind(("email", email));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
