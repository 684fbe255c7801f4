//! Identity provider: registers credentials, opens device-local sessions
//! and reports the current signed-in identity.
//!
//! [`LocalIdentityProvider`] keeps identities and sessions in repositories
//! and the raw session token in memory. Hosts persist the token with
//! [`LocalIdentityProvider::session_token`] and hand it back through
//! [`LocalIdentityProvider::restore_session`] on the next start.

use std::sync::{PoisonError, RwLock};

use chrono::{Duration, Utc};
use signdesk_core::error::SignDeskError;
use signdesk_core::models::identity::CreateIdentity;
use signdesk_core::models::session::{CreateSession, Session};
use signdesk_core::repository::{IdentityRepository, SessionRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

#[derive(Debug, Clone, Default)]
pub struct UserAttributes {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub username: String,
    pub password: String,
    pub attributes: UserAttributes,
    /// Open a session as soon as the identity is registered.
    pub auto_sign_in: bool,
}

#[derive(Debug, Clone)]
pub struct SignUpOutput {
    pub user_id: Uuid,
    pub is_sign_up_complete: bool,
    pub is_signed_in: bool,
}

#[derive(Debug, Clone)]
pub struct SignInOutput {
    pub is_signed_in: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInDetails {
    pub login_id: String,
}

/// The identity behind the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub username: String,
    pub groups: Vec<String>,
    pub sign_in_details: SignInDetails,
}

pub trait IdentityProvider: Send + Sync {
    fn sign_up(
        &self,
        input: SignUpInput,
    ) -> impl Future<Output = Result<SignUpOutput, AuthError>> + Send;
    fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<SignInOutput, AuthError>> + Send;
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
    /// `None` when no session is active. Expired sessions count as absent.
    fn current_user(&self) -> impl Future<Output = Result<Option<CurrentUser>, AuthError>> + Send;
}

/// Placeholder provider for deployments without an identity provider.
/// It has no values, so a controller typed over it never calls the provider.
#[derive(Debug)]
pub enum NoIdentityProvider {}

impl IdentityProvider for NoIdentityProvider {
    async fn sign_up(&self, _input: SignUpInput) -> Result<SignUpOutput, AuthError> {
        match *self {}
    }

    async fn sign_in(&self, _username: &str, _password: &str) -> Result<SignInOutput, AuthError> {
        match *self {}
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match *self {}
    }

    async fn current_user(&self) -> Result<Option<CurrentUser>, AuthError> {
        match *self {}
    }
}

/// Repository-backed identity provider.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct LocalIdentityProvider<I: IdentityRepository, S: SessionRepository> {
    identities: I,
    sessions: S,
    config: AuthConfig,
    token: RwLock<Option<String>>,
}

impl<I: IdentityRepository, S: SessionRepository> LocalIdentityProvider<I, S> {
    pub fn new(identities: I, sessions: S, config: AuthConfig) -> Self {
        Self {
            identities,
            sessions,
            config,
            token: RwLock::new(None),
        }
    }

    /// Raw token of the device-local session, if any.
    pub fn session_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adopt a previously persisted token. It is validated lazily by the
    /// next `current_user` or `sign_in` call.
    pub fn restore_session(&self, raw: String) {
        self.set_token(Some(raw));
    }

    /// Grant group membership, e.g. `admins`. Returns the resulting groups.
    pub async fn add_to_group(&self, username: &str, group: &str) -> Result<Vec<String>, AuthError> {
        let identity = self
            .identities
            .get_by_username(username)
            .await
            .map_err(|e| match e {
                SignDeskError::NotFound { .. } => AuthError::RecordNotFound {
                    username: username.to_string(),
                },
                other => other.into(),
            })?;
        let updated = self.identities.add_to_group(identity.id, group).await?;
        info!(username = %username, group = %group, "Identity added to group");
        Ok(updated.groups)
    }

    /// Remove expired session records, returning how many were deleted.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AuthError> {
        Ok(self.sessions.cleanup_expired().await?)
    }

    fn set_token(&self, value: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    async fn open_session(&self, identity_id: Uuid) -> Result<(), AuthError> {
        let raw = token::generate_session_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.session_lifetime_secs as i64);
        self.sessions
            .create(CreateSession {
                identity_id,
                token_hash: token::hash_session_token(&raw),
                expires_at,
            })
            .await?;
        self.set_token(Some(raw));
        Ok(())
    }

    /// Resolve the held token to a live session, forgetting it when the
    /// session is gone or expired.
    async fn active_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(raw) = self.session_token() else {
            return Ok(None);
        };

        let session = match self
            .sessions
            .get_by_token_hash(&token::hash_session_token(&raw))
            .await
        {
            Ok(session) => session,
            Err(SignDeskError::NotFound { .. }) => {
                self.set_token(None);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if session.expires_at <= Utc::now() {
            self.sessions.invalidate(session.id).await?;
            self.set_token(None);
            debug!(identity_id = %session.identity_id, "Session expired");
            return Ok(None);
        }

        Ok(Some(session))
    }
}

impl<I: IdentityRepository, S: SessionRepository> IdentityProvider for LocalIdentityProvider<I, S> {
    async fn sign_up(&self, input: SignUpInput) -> Result<SignUpOutput, AuthError> {
        if input.username.trim().is_empty() {
            return Err(AuthError::MissingField("username"));
        }
        password::check_password_policy(&input.password, self.config.min_password_length)?;
        if input.auto_sign_in && self.active_session().await?.is_some() {
            return Err(AuthError::AlreadySignedIn);
        }

        match self.identities.get_by_username(&input.username).await {
            Ok(_) => return Err(AuthError::UserAlreadyExists),
            Err(SignDeskError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let identity = self
            .identities
            .create(CreateIdentity {
                username: input.username,
                password: input.password,
                email: input.attributes.email,
                given_name: input.attributes.given_name,
                family_name: input.attributes.family_name,
            })
            .await
            .map_err(|e| match e {
                SignDeskError::AlreadyExists { .. } => AuthError::UserAlreadyExists,
                other => other.into(),
            })?;

        info!(username = %identity.username, identity_id = %identity.id, "Identity registered");

        if input.auto_sign_in {
            self.open_session(identity.id).await?;
        }

        Ok(SignUpOutput {
            user_id: identity.id,
            is_sign_up_complete: true,
            is_signed_in: input.auto_sign_in,
        })
    }

    async fn sign_in(&self, username: &str, password: &str) -> Result<SignInOutput, AuthError> {
        if self.active_session().await?.is_some() {
            return Err(AuthError::AlreadySignedIn);
        }

        let identity = match self.identities.get_by_username(username).await {
            Ok(identity) => identity,
            Err(SignDeskError::NotFound { .. }) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let valid = password::verify_password(
            password,
            &identity.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            debug!(username = %username, "Sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.open_session(identity.id).await?;
        info!(username = %username, "Identity signed in");

        Ok(SignInOutput { is_signed_in: true })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(raw) = self.session_token() else {
            return Ok(());
        };
        self.set_token(None);

        match self
            .sessions
            .get_by_token_hash(&token::hash_session_token(&raw))
            .await
        {
            Ok(session) => self.sessions.invalidate(session.id).await?,
            Err(SignDeskError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        info!("Identity signed out");
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<CurrentUser>, AuthError> {
        let Some(session) = self.active_session().await? else {
            return Ok(None);
        };

        let identity = self.identities.get_by_id(session.identity_id).await?;
        Ok(Some(CurrentUser {
            user_id: identity.id,
            sign_in_details: SignInDetails {
                login_id: identity.username.clone(),
            },
            username: identity.username,
            groups: identity.groups,
        }))
    }
}
