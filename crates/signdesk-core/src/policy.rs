//! Static authorization policy table for the data service.
//!
//! Each entity carries a list of rules; a request is allowed when any
//! rule admits the caller for the requested operation. Two postures are
//! provided: [`AuthorizationPolicy::user_pool`] for deployments backed by
//! an identity provider, and [`AuthorizationPolicy::api_key`] for the
//! provider-less variant where callers present a time-limited key.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SignDeskError, SignDeskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    User,
    UserProfile,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::User => "User",
            Entity::UserProfile => "UserProfile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: &'static [Operation] = &[
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Which credential a deployment expects by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    UserPool,
    ApiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The creating identity may read and write its own records.
    Owner,
    /// Any signed-in identity may perform the listed operations.
    Authenticated(&'static [Operation]),
    /// Members of any listed group may perform the listed operations.
    Groups {
        groups: &'static [&'static str],
        operations: &'static [Operation],
    },
    /// Unauthenticated callers holding a valid API key.
    ApiKey(&'static [Operation]),
}

#[derive(Debug, Clone, Copy)]
pub struct EntityPolicy {
    pub entity: Entity,
    pub rules: &'static [Rule],
}

/// An identity as seen by the data service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Identity(Principal),
    ApiKey(String),
    Anonymous,
}

/// A key accepted by [`Rule::ApiKey`] until `expires_at`.
#[derive(Debug, Clone)]
pub struct ApiKeyConfig {
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

impl ApiKeyConfig {
    pub fn new(key: impl Into<String>, expires_in_days: i64) -> Self {
        Self {
            key: key.into(),
            expires_at: Utc::now() + Duration::days(expires_in_days),
        }
    }

    pub fn accepts(&self, presented: &str, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.key == presented
    }
}

const USER_POOL_RULES: &[Rule] = &[
    Rule::Owner,
    Rule::Authenticated(&[Operation::Read]),
    Rule::Groups {
        groups: &["admins"],
        operations: Operation::ALL,
    },
];

const API_KEY_RULES: &[Rule] = &[Rule::ApiKey(&[
    Operation::Create,
    Operation::Read,
    Operation::Update,
])];

const USER_POOL_ENTITIES: &[EntityPolicy] = &[
    EntityPolicy {
        entity: Entity::User,
        rules: USER_POOL_RULES,
    },
    EntityPolicy {
        entity: Entity::UserProfile,
        rules: USER_POOL_RULES,
    },
];

const API_KEY_ENTITIES: &[EntityPolicy] = &[
    EntityPolicy {
        entity: Entity::User,
        rules: API_KEY_RULES,
    },
    EntityPolicy {
        entity: Entity::UserProfile,
        rules: API_KEY_RULES,
    },
];

#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    pub default_mode: AuthMode,
    entities: &'static [EntityPolicy],
    api_key: Option<ApiKeyConfig>,
}

impl AuthorizationPolicy {
    /// Owner read/write, authenticated read, `admins` group full access.
    pub fn user_pool() -> Self {
        Self {
            default_mode: AuthMode::UserPool,
            entities: USER_POOL_ENTITIES,
            api_key: None,
        }
    }

    /// Public create/read/update for holders of `key`.
    pub fn api_key(key: ApiKeyConfig) -> Self {
        Self {
            default_mode: AuthMode::ApiKey,
            entities: API_KEY_ENTITIES,
            api_key: Some(key),
        }
    }

    pub fn api_key_config(&self) -> Option<&ApiKeyConfig> {
        self.api_key.as_ref()
    }

    pub fn rules_for(&self, entity: Entity) -> &'static [Rule] {
        self.entities
            .iter()
            .find(|p| p.entity == entity)
            .map(|p| p.rules)
            .unwrap_or(&[])
    }

    pub fn authorize(
        &self,
        entity: Entity,
        operation: Operation,
        caller: &Caller,
        record_owner: Option<&str>,
    ) -> SignDeskResult<()> {
        self.authorize_at(entity, operation, caller, record_owner, Utc::now())
    }

    pub fn authorize_at(
        &self,
        entity: Entity,
        operation: Operation,
        caller: &Caller,
        record_owner: Option<&str>,
        now: DateTime<Utc>,
    ) -> SignDeskResult<()> {
        let allowed = self
            .rules_for(entity)
            .iter()
            .any(|rule| self.rule_allows(rule, operation, caller, record_owner, now));

        if allowed {
            return Ok(());
        }

        debug!(
            entity = entity.as_str(),
            operation = operation.as_str(),
            "Authorization denied"
        );
        Err(SignDeskError::AuthorizationDenied {
            entity: entity.as_str().into(),
            operation: operation.as_str().into(),
        })
    }

    fn rule_allows(
        &self,
        rule: &Rule,
        operation: Operation,
        caller: &Caller,
        record_owner: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        match (rule, caller) {
            // A new record may only be claimed for the caller itself.
            (Rule::Owner, Caller::Identity(principal)) => match record_owner {
                Some(owner) => owner == principal.user_id,
                None => operation == Operation::Create,
            },
            (Rule::Authenticated(ops), Caller::Identity(_)) => ops.contains(&operation),
            (Rule::Groups { groups, operations }, Caller::Identity(principal)) => {
                operations.contains(&operation)
                    && principal
                        .groups
                        .iter()
                        .any(|g| groups.contains(&g.as_str()))
            }
            (Rule::ApiKey(ops), Caller::ApiKey(presented)) => {
                ops.contains(&operation)
                    && self
                        .api_key
                        .as_ref()
                        .is_some_and(|config| config.accepts(presented, now))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: &str, groups: &[&str]) -> Caller {
        Caller::Identity(Principal {
            user_id: user_id.into(),
            username: format!("user-{user_id}"),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        })
    }

    #[test]
    fn owner_can_update_own_record() {
        let policy = AuthorizationPolicy::user_pool();
        let caller = identity("abc", &[]);
        assert!(
            policy
                .authorize(Entity::User, Operation::Update, &caller, Some("abc"))
                .is_ok()
        );
    }

    #[test]
    fn authenticated_can_read_but_not_write_others() {
        let policy = AuthorizationPolicy::user_pool();
        let caller = identity("abc", &[]);
        assert!(
            policy
                .authorize(Entity::User, Operation::Read, &caller, Some("xyz"))
                .is_ok()
        );
        let err = policy
            .authorize(Entity::User, Operation::Update, &caller, Some("xyz"))
            .unwrap_err();
        assert!(matches!(err, SignDeskError::AuthorizationDenied { .. }));
    }

    #[test]
    fn any_identity_may_create() {
        let policy = AuthorizationPolicy::user_pool();
        let caller = identity("abc", &[]);
        assert!(
            policy
                .authorize(Entity::UserProfile, Operation::Create, &caller, None)
                .is_ok()
        );
        assert!(
            policy
                .authorize(Entity::UserProfile, Operation::Create, &caller, Some("abc"))
                .is_ok()
        );
    }

    #[test]
    fn identity_cannot_create_for_another_owner() {
        let policy = AuthorizationPolicy::user_pool();
        let err = policy
            .authorize(Entity::User, Operation::Create, &identity("abc", &[]), Some("xyz"))
            .unwrap_err();
        assert!(matches!(err, SignDeskError::AuthorizationDenied { .. }));

        let admin = identity("root", &["admins"]);
        assert!(
            policy
                .authorize(Entity::User, Operation::Create, &admin, Some("xyz"))
                .is_ok()
        );
    }

    #[test]
    fn admins_have_full_access() {
        let policy = AuthorizationPolicy::user_pool();
        let admin = identity("root", &["admins"]);
        for op in Operation::ALL {
            assert!(
                policy
                    .authorize(Entity::User, *op, &admin, Some("someone-else"))
                    .is_ok(),
                "admin denied {op:?}"
            );
        }
    }

    #[test]
    fn anonymous_is_denied_under_user_pool() {
        let policy = AuthorizationPolicy::user_pool();
        assert!(
            policy
                .authorize(Entity::User, Operation::Read, &Caller::Anonymous, None)
                .is_err()
        );
    }

    #[test]
    fn api_key_allows_create_read_update_only() {
        let policy = AuthorizationPolicy::api_key(ApiKeyConfig::new("da2-key", 30));
        let caller = Caller::ApiKey("da2-key".into());
        assert!(
            policy
                .authorize(Entity::User, Operation::Create, &caller, None)
                .is_ok()
        );
        assert!(
            policy
                .authorize(Entity::User, Operation::Update, &caller, None)
                .is_ok()
        );
        assert!(
            policy
                .authorize(Entity::User, Operation::Delete, &caller, None)
                .is_err()
        );
    }

    #[test]
    fn wrong_or_expired_api_key_is_denied() {
        let config = ApiKeyConfig::new("da2-key", 30);
        let expires_at = config.expires_at;
        let policy = AuthorizationPolicy::api_key(config);

        let wrong = Caller::ApiKey("other".into());
        assert!(
            policy
                .authorize(Entity::User, Operation::Read, &wrong, None)
                .is_err()
        );

        let right = Caller::ApiKey("da2-key".into());
        assert!(
            policy
                .authorize_at(
                    Entity::User,
                    Operation::Read,
                    &right,
                    None,
                    expires_at + Duration::seconds(1),
                )
                .is_err()
        );
    }

    #[test]
    fn identities_are_denied_under_api_key_policy() {
        let policy = AuthorizationPolicy::api_key(ApiKeyConfig::new("k", 1));
        let caller = identity("abc", &["admins"]);
        assert!(
            policy
                .authorize(Entity::User, Operation::Read, &caller, Some("abc"))
                .is_err()
        );
    }
}
