//! SurrealDB implementation of [`UserProfileRepository`].

use chrono::{DateTime, Utc};
use signdesk_core::error::SignDeskResult;
use signdesk_core::models::user_profile::{CreateUserProfile, UpdateUserProfile, UserProfile};
use signdesk_core::repository::UserProfileRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserProfileRow {
    user_id: String,
    bio: Option<String>,
    website: Option<String>,
    location: Option<String>,
    owner: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct UserProfileRowWithId {
    record_id: String,
    user_id: String,
    bio: Option<String>,
    website: Option<String>,
    location: Option<String>,
    owner: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_profile(row: UserProfileRow, id: Uuid) -> Result<UserProfile, DbError> {
    let user_id = Uuid::parse_str(&row.user_id)
        .map_err(|e| DbError::Corrupt(format!("invalid user UUID: {e}")))?;
    Ok(UserProfile {
        id,
        user_id,
        bio: row.bio,
        website: row.website,
        location: row.location,
        owner: row.owner,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl UserProfileRowWithId {
    fn try_into_profile(self) -> Result<UserProfile, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        row_to_profile(
            UserProfileRow {
                user_id: self.user_id,
                bio: self.bio,
                website: self.website,
                location: self.location,
                owner: self.owner,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            id,
        )
    }
}

/// SurrealDB implementation of the UserProfile repository.
///
/// The unique index on `user_id` keeps the relation one-to-one; a second
/// profile for the same user is rejected as a conflict.
#[derive(Clone)]
pub struct SurrealUserProfileRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserProfileRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserProfileRepository for SurrealUserProfileRepository<C> {
    async fn create(&self, input: CreateUserProfile) -> SignDeskResult<UserProfile> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user_profile', $id) SET \
                 user_id = $user_id, bio = $bio, \
                 website = $website, location = $location, \
                 owner = $owner",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("bio", input.bio))
            .bind(("website", input.website))
            .bind(("location", input.location))
            .bind(("owner", input.owner))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("user_profile", e.to_string()))?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: id_str,
        })?;

        row_to_profile(row, id).map_err(Into::into)
    }

    async fn get_by_id(&self, id: Uuid) -> SignDeskResult<UserProfile> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user_profile', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: id_str,
        })?;

        row_to_profile(row, id).map_err(Into::into)
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> SignDeskResult<UserProfile> {
        let user_id_str = user_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_profile \
                 WHERE user_id = $user_id",
            )
            .bind(("user_id", user_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserProfileRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: format!("user_id={user_id_str}"),
        })?;

        row.try_into_profile().map_err(Into::into)
    }

    async fn update(&self, id: Uuid, input: UpdateUserProfile) -> SignDeskResult<UserProfile> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.bio.is_some() {
            sets.push("bio = $bio");
        }
        if input.website.is_some() {
            sets.push("website = $website");
        }
        if input.location.is_some() {
            sets.push("location = $location");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user_profile', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(bio) = input.bio {
            builder = builder.bind(("bio", bio));
        }
        if let Some(website) = input.website {
            builder = builder.bind(("website", website));
        }
        if let Some(location) = input.location {
            builder = builder.bind(("location", location));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("user_profile", e.to_string()))?;

        let rows: Vec<UserProfileRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_profile".into(),
            id: id_str,
        })?;

        row_to_profile(row, id).map_err(Into::into)
    }
}
