//! Data-service client.
//!
//! Wraps the repositories behind the authorization policy and reports
//! outcomes as [`DataResponse`] values: a call never rejects, failures are
//! carried in `errors` next to (possibly absent) `data`. Callers fold a
//! response with [`DataResponse::into_result`] so that soft errors are
//! never mistaken for success.

use std::fmt;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{SignDeskError, SignDeskResult};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter};
use crate::models::user_profile::{CreateUserProfile, UpdateUserProfile, UserProfile};
use crate::policy::{AuthorizationPolicy, Caller, Entity, Operation};
use crate::repository::{Pagination, UserProfileRepository, UserRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataErrorKind {
    Unauthorized,
    NotFound,
    Conflict,
    Validation,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataError {
    pub kind: DataErrorKind,
    pub message: String,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<SignDeskError> for DataError {
    fn from(err: SignDeskError) -> Self {
        let kind = match &err {
            SignDeskError::AuthorizationDenied { .. } => DataErrorKind::Unauthorized,
            SignDeskError::NotFound { .. } => DataErrorKind::NotFound,
            SignDeskError::AlreadyExists { .. } => DataErrorKind::Conflict,
            SignDeskError::Validation { .. } => DataErrorKind::Validation,
            _ => DataErrorKind::Internal,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// `{ data, errors }` envelope returned by every data-service call.
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub data: Option<T>,
    pub errors: Vec<DataError>,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failed(error: DataError) -> Self {
        Self {
            data: None,
            errors: vec![error],
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Treat any reported error as a failure, even when data is present.
    pub fn into_result(self) -> SignDeskResult<T> {
        if !self.errors.is_empty() {
            return Err(SignDeskError::DataService {
                messages: self.errors.iter().map(ToString::to_string).collect(),
            });
        }
        self.data.ok_or_else(|| SignDeskError::DataService {
            messages: vec!["response contained no data".into()],
        })
    }
}

fn respond<T>(entity: Entity, operation: &str, result: SignDeskResult<T>) -> DataResponse<T> {
    match result {
        Ok(data) => DataResponse::ok(data),
        Err(err) => {
            warn!(
                entity = entity.as_str(),
                operation,
                error = %err,
                "Data service request failed"
            );
            DataResponse::failed(err.into())
        }
    }
}

/// The identity id a caller would be recorded as owner under, if any.
fn caller_owner(caller: &Caller) -> Option<String> {
    match caller {
        Caller::Identity(principal) => Some(principal.user_id.clone()),
        _ => None,
    }
}

/// Typed client over the `User` and `UserProfile` entities.
pub struct DataClient<U: UserRepository, R: UserProfileRepository> {
    users: U,
    profiles: R,
    policy: AuthorizationPolicy,
}

impl<U: UserRepository, R: UserProfileRepository> DataClient<U, R> {
    pub fn new(users: U, profiles: R, policy: AuthorizationPolicy) -> Self {
        Self {
            users,
            profiles,
            policy,
        }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    pub async fn create_user(&self, caller: &Caller, input: CreateUser) -> DataResponse<User> {
        respond(
            Entity::User,
            "create",
            self.try_create_user(caller, input).await,
        )
    }

    pub async fn get_user(&self, caller: &Caller, id: Uuid) -> DataResponse<User> {
        respond(Entity::User, "get", self.try_get_user(caller, id).await)
    }

    pub async fn update_user(
        &self,
        caller: &Caller,
        id: Uuid,
        input: UpdateUser,
    ) -> DataResponse<User> {
        respond(
            Entity::User,
            "update",
            self.try_update_user(caller, id, input).await,
        )
    }

    /// Records matching `filter` that the caller may read.
    pub async fn list_users(&self, caller: &Caller, filter: UserFilter) -> DataResponse<Vec<User>> {
        respond(
            Entity::User,
            "list",
            self.try_list_users(caller, filter).await,
        )
    }

    pub async fn create_profile(
        &self,
        caller: &Caller,
        input: CreateUserProfile,
    ) -> DataResponse<UserProfile> {
        respond(
            Entity::UserProfile,
            "create",
            self.try_create_profile(caller, input).await,
        )
    }

    pub async fn update_profile(
        &self,
        caller: &Caller,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> DataResponse<UserProfile> {
        respond(
            Entity::UserProfile,
            "update",
            self.try_update_profile(caller, id, input).await,
        )
    }

    /// The profile attached to `user_id`; `data` is `Some(None)` when the
    /// user has none yet.
    pub async fn get_profile_for_user(
        &self,
        caller: &Caller,
        user_id: Uuid,
    ) -> DataResponse<Option<UserProfile>> {
        respond(
            Entity::UserProfile,
            "get",
            self.try_get_profile_for_user(caller, user_id).await,
        )
    }

    async fn try_create_user(&self, caller: &Caller, mut input: CreateUser) -> SignDeskResult<User> {
        if input.owner.is_none() {
            input.owner = caller_owner(caller);
        }
        self.policy.authorize(
            Entity::User,
            Operation::Create,
            caller,
            input.owner.as_deref(),
        )?;
        self.users.create(input).await
    }

    async fn try_get_user(&self, caller: &Caller, id: Uuid) -> SignDeskResult<User> {
        let user = self.users.get_by_id(id).await?;
        self.policy
            .authorize(Entity::User, Operation::Read, caller, user.owner.as_deref())?;
        Ok(user)
    }

    async fn try_update_user(
        &self,
        caller: &Caller,
        id: Uuid,
        input: UpdateUser,
    ) -> SignDeskResult<User> {
        let current = self.users.get_by_id(id).await?;
        self.policy.authorize(
            Entity::User,
            Operation::Update,
            caller,
            current.owner.as_deref(),
        )?;
        self.users.update(id, input).await
    }

    async fn try_list_users(&self, caller: &Caller, filter: UserFilter) -> SignDeskResult<Vec<User>> {
        // Reject callers no read rule could ever admit.
        let own = caller_owner(caller);
        self.policy
            .authorize(Entity::User, Operation::Read, caller, own.as_deref())?;

        let page = self.users.list(filter, Pagination::default()).await?;
        Ok(page
            .items
            .into_iter()
            .filter(|user| {
                self.policy
                    .authorize(Entity::User, Operation::Read, caller, user.owner.as_deref())
                    .is_ok()
            })
            .collect())
    }

    async fn try_create_profile(
        &self,
        caller: &Caller,
        mut input: CreateUserProfile,
    ) -> SignDeskResult<UserProfile> {
        // The profile hangs off an existing user the caller may write.
        let user = self.users.get_by_id(input.user_id).await?;
        self.policy
            .authorize(Entity::User, Operation::Update, caller, user.owner.as_deref())?;

        if input.owner.is_none() {
            input.owner = user.owner.or_else(|| caller_owner(caller));
        }
        self.policy.authorize(
            Entity::UserProfile,
            Operation::Create,
            caller,
            input.owner.as_deref(),
        )?;
        self.profiles.create(input).await
    }

    async fn try_update_profile(
        &self,
        caller: &Caller,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> SignDeskResult<UserProfile> {
        let current = self.profiles.get_by_id(id).await?;
        self.policy.authorize(
            Entity::UserProfile,
            Operation::Update,
            caller,
            current.owner.as_deref(),
        )?;
        self.profiles.update(id, input).await
    }

    async fn try_get_profile_for_user(
        &self,
        caller: &Caller,
        user_id: Uuid,
    ) -> SignDeskResult<Option<UserProfile>> {
        let profile = match self.profiles.get_by_user_id(user_id).await {
            Ok(p) => p,
            Err(SignDeskError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.policy.authorize(
            Entity::UserProfile,
            Operation::Read,
            caller,
            profile.owner.as_deref(),
        )?;
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_fail_even_with_data() {
        let response = DataResponse {
            data: Some(1u32),
            errors: vec![DataError {
                kind: DataErrorKind::Conflict,
                message: "duplicate".into(),
            }],
        };
        assert!(response.has_errors());
        let err = response.into_result().unwrap_err();
        match err {
            SignDeskError::DataService { messages } => {
                assert_eq!(messages, vec!["Conflict: duplicate".to_string()]);
            }
            other => panic!("expected DataService, got {other:?}"),
        }
    }

    #[test]
    fn missing_data_is_a_failure() {
        let response: DataResponse<u32> = DataResponse {
            data: None,
            errors: Vec::new(),
        };
        assert!(response.into_result().is_err());
    }

    #[test]
    fn clean_response_yields_data() {
        assert_eq!(DataResponse::ok("x").into_result().unwrap(), "x");
    }

    #[test]
    fn error_kinds_follow_the_error_taxonomy() {
        let denied: DataError = SignDeskError::AuthorizationDenied {
            entity: "User".into(),
            operation: "update".into(),
        }
        .into();
        assert_eq!(denied.kind, DataErrorKind::Unauthorized);

        let missing: DataError = SignDeskError::NotFound {
            entity: "user".into(),
            id: "1".into(),
        }
        .into();
        assert_eq!(missing.kind, DataErrorKind::NotFound);

        let dup: DataError = SignDeskError::AlreadyExists {
            entity: "user".into(),
        }
        .into();
        assert_eq!(dup.kind, DataErrorKind::Conflict);
    }
}
