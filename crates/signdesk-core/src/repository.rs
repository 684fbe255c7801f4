//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. `UserRepository` and
//! `UserProfileRepository` back the data service; `IdentityRepository`
//! and `SessionRepository` back the identity provider.

use uuid::Uuid;

use crate::error::SignDeskResult;
use crate::models::{
    identity::{CreateIdentity, Identity},
    session::{CreateSession, Session},
    user::{CreateUser, UpdateUser, User, UserFilter},
    user_profile::{CreateUserProfile, UpdateUserProfile, UserProfile},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Data service
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = SignDeskResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SignDeskResult<User>> + Send;
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = SignDeskResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = SignDeskResult<User>> + Send;
    /// Records matching every field set in `filter`, oldest first.
    fn list(
        &self,
        filter: UserFilter,
        pagination: Pagination,
    ) -> impl Future<Output = SignDeskResult<PaginatedResult<User>>> + Send;
}

pub trait UserProfileRepository: Send + Sync {
    fn create(
        &self,
        input: CreateUserProfile,
    ) -> impl Future<Output = SignDeskResult<UserProfile>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SignDeskResult<UserProfile>> + Send;
    fn get_by_user_id(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = SignDeskResult<UserProfile>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> impl Future<Output = SignDeskResult<UserProfile>> + Send;
}

// ---------------------------------------------------------------------------
// Identity provider
// ---------------------------------------------------------------------------

pub trait IdentityRepository: Send + Sync {
    fn create(
        &self,
        input: CreateIdentity,
    ) -> impl Future<Output = SignDeskResult<Identity>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SignDeskResult<Identity>> + Send;
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = SignDeskResult<Identity>> + Send;
    /// Add the identity to a group. Adding an existing membership is a no-op.
    fn add_to_group(
        &self,
        id: Uuid,
        group: &str,
    ) -> impl Future<Output = SignDeskResult<Identity>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession)
    -> impl Future<Output = SignDeskResult<Session>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = SignDeskResult<Session>> + Send;
    fn invalidate(&self, id: Uuid) -> impl Future<Output = SignDeskResult<()>> + Send;
    /// Delete expired sessions, returning how many were removed.
    fn cleanup_expired(&self) -> impl Future<Output = SignDeskResult<u64>> + Send;
}
