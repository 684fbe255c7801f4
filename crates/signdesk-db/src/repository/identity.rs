//! SurrealDB implementation of [`IdentityRepository`].

use chrono::{DateTime, Utc};
use signdesk_core::error::SignDeskResult;
use signdesk_core::models::identity::{CreateIdentity, Identity};
use signdesk_core::repository::IdentityRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;
use crate::password::hash_password;

#[derive(Debug, SurrealValue)]
struct IdentityRow {
    username: String,
    password_hash: String,
    email: String,
    given_name: String,
    family_name: String,
    groups: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct IdentityRowWithId {
    record_id: String,
    username: String,
    password_hash: String,
    email: String,
    given_name: String,
    family_name: String,
    groups: Vec<String>,
    created_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self, id: Uuid) -> Identity {
        Identity {
            id,
            username: self.username,
            password_hash: self.password_hash,
            email: self.email,
            given_name: self.given_name,
            family_name: self.family_name,
            groups: self.groups,
            created_at: self.created_at,
        }
    }
}

impl IdentityRowWithId {
    fn try_into_identity(self) -> Result<Identity, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        Ok(Identity {
            id,
            username: self.username,
            password_hash: self.password_hash,
            email: self.email,
            given_name: self.given_name,
            family_name: self.family_name,
            groups: self.groups,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Identity repository.
#[derive(Clone)]
pub struct SurrealIdentityRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealIdentityRepository<C> {
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

impl<C: Connection> IdentityRepository for SurrealIdentityRepository<C> {
    async fn create(&self, input: CreateIdentity) -> SignDeskResult<Identity> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('identity', $id) SET \
                 username = $username, \
                 password_hash = $password_hash, \
                 email = $email, \
                 given_name = $given_name, \
                 family_name = $family_name, \
                 groups = []",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("password_hash", password_hash))
            .bind(("email", input.email))
            .bind(("given_name", input.given_name))
            .bind(("family_name", input.family_name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("identity", e.to_string()))?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity".into(),
            id: id_str,
        })?;

        Ok(row.into_identity(id))
    }

    async fn get_by_id(&self, id: Uuid) -> SignDeskResult<Identity> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('identity', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity".into(),
            id: id_str,
        })?;

        Ok(row.into_identity(id))
    }

    async fn get_by_username(&self, username: &str) -> SignDeskResult<Identity> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM identity \
                 WHERE username = $username",
            )
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity".into(),
            id: format!("username={username}"),
        })?;

        Ok(row.try_into_identity()?)
    }

    async fn add_to_group(&self, id: Uuid, group: &str) -> SignDeskResult<Identity> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('identity', $id) SET \
                 groups = array::union(groups, [$group])",
            )
            .bind(("id", id_str.clone()))
            .bind(("group", group.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("identity", e.to_string()))?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity".into(),
            id: id_str,
        })?;

        Ok(row.into_identity(id))
    }
}
