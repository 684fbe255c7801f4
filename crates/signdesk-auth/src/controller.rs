//! Auth page controller: the sign-up, sign-in, sign-out and rehydration
//! workflows behind the single-page account screen.
//!
//! One engine serves both deployments. With an identity provider, the
//! provider owns credentials and the data service holds the matching
//! `User` record. Without one, the record itself carries an Argon2id
//! hash and the data service is reached with the configured API key.
//!
//! Every workflow runs its external calls strictly in sequence. The
//! `is_loading` flag doubles as the only mutual-exclusion signal: a second
//! submission while one is in flight fails with [`AuthError::Busy`].

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use signdesk_core::models::user::{CreateUser, UpdateUser, User, UserFilter, UserStatus};
use signdesk_core::models::user_profile::{CreateUserProfile, UpdateUserProfile, UserProfile};
use signdesk_core::repository::{UserProfileRepository, UserRepository};
use signdesk_core::{Caller, DataClient, DataErrorKind, Principal};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::{check_password_policy, verify_password};
use crate::provider::{
    CurrentUser, IdentityProvider, NoIdentityProvider, SignUpInput, UserAttributes,
};

const SIGN_UP_FALLBACK: &str = "Error during sign-up";
const SIGN_IN_FALLBACK: &str = "Error during sign-in";
const SIGN_OUT_FALLBACK: &str = "Error during sign-out";
const PROFILE_FALLBACK: &str = "Error saving profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub has_identity_provider: bool,
    pub requires_profile_lookup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    SignIn,
    SignUp,
    SignedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Username,
    Password,
    Email,
    GivenName,
    FamilyName,
}

impl FormField {
    pub fn label(&self) -> &'static str {
        match self {
            FormField::Username => "Username",
            FormField::Password => "Password",
            FormField::Email => "Email",
            FormField::GivenName => "Given name",
            FormField::FamilyName => "Family name",
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub username: String,
    pub password: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

impl fmt::Debug for FormData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormData")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("email", &self.email)
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .finish()
    }
}

impl FormData {
    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::Username => &self.username,
            FormField::Password => &self.password,
            FormField::Email => &self.email,
            FormField::GivenName => &self.given_name,
            FormField::FamilyName => &self.family_name,
        }
    }

    fn slot(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Username => &mut self.username,
            FormField::Password => &mut self.password,
            FormField::Email => &mut self.email,
            FormField::GivenName => &mut self.given_name,
            FormField::FamilyName => &mut self.family_name,
        }
    }

    fn require(&self, field: FormField) -> Result<(), AuthError> {
        if self.get(field).trim().is_empty() {
            return Err(AuthError::MissingField(field.label()));
        }
        Ok(())
    }

    /// Local checks run before any external call of the sign-up workflow.
    pub fn validate_sign_up(&self, min_password_length: usize) -> Result<(), AuthError> {
        for field in [
            FormField::Username,
            FormField::Password,
            FormField::Email,
            FormField::GivenName,
            FormField::FamilyName,
        ] {
            self.require(field)?;
        }
        check_password_policy(&self.password, min_password_length)
    }

    pub fn validate_sign_in(&self, min_password_length: usize) -> Result<(), AuthError> {
        self.require(FormField::Username)?;
        self.require(FormField::Password)?;
        check_password_policy(&self.password, min_password_length)
    }
}

/// The signed-in user: a data record merged with the provider identity
/// that owns it, when there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: UserStatus,
    pub roles: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub identity_id: Option<Uuid>,
    pub groups: Vec<String>,
    pub login_id: Option<String>,
    pub profile: Option<UserProfile>,
}

impl SessionUser {
    pub fn from_record(record: User) -> Self {
        Self {
            user_id: record.id,
            username: record.username,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            status: record.status,
            roles: record.roles,
            last_login: record.last_login,
            identity_id: None,
            groups: Vec::new(),
            login_id: None,
            profile: None,
        }
    }

    /// Combine a provider identity with its data record. The usernames
    /// must agree.
    pub fn merge(identity: &CurrentUser, record: User) -> Result<Self, AuthError> {
        if identity.username != record.username {
            return Err(AuthError::IdentityMismatch {
                identity: identity.username.clone(),
                record: record.username,
            });
        }
        let mut user = Self::from_record(record);
        user.identity_id = Some(identity.user_id);
        user.groups = identity.groups.clone();
        user.login_id = Some(identity.sign_in_details.login_id.clone());
        Ok(user)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Transient page state. Nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub phase: AuthPhase,
    pub form: FormData,
    pub user: Option<SessionUser>,
    pub error: Option<String>,
    pub is_loading: bool,
    pub theme: Theme,
}

impl PageState {
    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        *self.form.slot(field) = value.into();
    }

    pub fn show_sign_up(&mut self) {
        if self.phase != AuthPhase::SignedIn {
            self.phase = AuthPhase::SignUp;
        }
        self.error = None;
    }

    pub fn show_sign_in(&mut self) {
        if self.phase != AuthPhase::SignedIn {
            self.phase = AuthPhase::SignIn;
        }
        self.error = None;
    }

    fn enter_signed_in(&mut self, user: SessionUser) {
        self.phase = AuthPhase::SignedIn;
        self.user = Some(user);
        self.form.password.clear();
        self.error = None;
    }

    fn reset(&mut self, clear_form: bool) {
        self.phase = AuthPhase::SignIn;
        self.user = None;
        self.error = None;
        if clear_form {
            self.form = FormData::default();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileInput {
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

/// Login timestamp strictly after `previous`.
pub(crate) fn next_login_timestamp(
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

fn error_message(err: &AuthError, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn identity_caller(identity: &CurrentUser) -> Caller {
    Caller::Identity(Principal {
        user_id: identity.user_id.to_string(),
        username: identity.username.clone(),
        groups: identity.groups.clone(),
    })
}

/// Clears `is_loading` when the workflow ends, however it ends.
struct LoadingGuard<'a> {
    state: &'a RwLock<PageState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .is_loading = false;
    }
}

pub struct AuthController<P, U, R>
where
    P: IdentityProvider,
    U: UserRepository,
    R: UserProfileRepository,
{
    provider: Option<P>,
    data: DataClient<U, R>,
    config: AuthConfig,
    state: RwLock<PageState>,
}

impl<U: UserRepository, R: UserProfileRepository> AuthController<NoIdentityProvider, U, R> {
    /// Controller for deployments without an identity provider.
    pub fn without_provider(data: DataClient<U, R>, config: AuthConfig) -> Self {
        Self {
            provider: None,
            data,
            config,
            state: RwLock::new(PageState::default()),
        }
    }
}

impl<P, U, R> AuthController<P, U, R>
where
    P: IdentityProvider,
    U: UserRepository,
    R: UserProfileRepository,
{
    pub fn new(provider: P, data: DataClient<U, R>, config: AuthConfig) -> Self {
        Self {
            provider: Some(provider),
            data,
            config,
            state: RwLock::new(PageState::default()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_identity_provider: self.provider.is_some(),
            requires_profile_lookup: self.config.requires_profile_lookup,
        }
    }

    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn state(&self) -> PageState {
        self.read_state().clone()
    }

    pub fn set_field(&self, field: FormField, value: impl Into<String>) {
        self.write_state().set_field(field, value);
    }

    pub fn show_sign_up(&self) {
        self.write_state().show_sign_up();
    }

    pub fn show_sign_in(&self) {
        self.write_state().show_sign_in();
    }

    pub fn dismiss_error(&self) {
        self.write_state().error = None;
    }

    pub fn toggle_theme(&self) -> Theme {
        let mut state = self.write_state();
        state.theme = state.theme.toggled();
        state.theme
    }

    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    /// Register a new account from the form and sign it in.
    pub async fn sign_up(&self) -> Result<SessionUser, AuthError> {
        let form = self.take_form();
        if let Err(e) = form.validate_sign_up(self.config.min_password_length) {
            return self.fail(SIGN_UP_FALLBACK, e);
        }
        let _loading = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return self.fail(SIGN_UP_FALLBACK, e),
        };

        let result = match &self.provider {
            Some(provider) => self.register_with_provider(provider, &form).await,
            None => self.register_direct(&form).await,
        };

        match result {
            Ok(user) => {
                info!(username = %user.username, "User signed up");
                self.write_state().enter_signed_in(user.clone());
                Ok(user)
            }
            Err(e) => self.fail(SIGN_UP_FALLBACK, e),
        }
    }

    /// Verify the form credentials, stamp `last_login` and sign in.
    pub async fn sign_in(&self) -> Result<SessionUser, AuthError> {
        let form = self.take_form();
        if let Err(e) = form.validate_sign_in(self.config.min_password_length) {
            return self.fail(SIGN_IN_FALLBACK, e);
        }
        let _loading = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return self.fail(SIGN_IN_FALLBACK, e),
        };

        let result = match &self.provider {
            Some(provider) => self.sign_in_with_provider(provider, &form).await,
            None => self.sign_in_direct(&form).await,
        };

        match result {
            Ok(user) => {
                info!(username = %user.username, "User signed in");
                self.write_state().enter_signed_in(user.clone());
                Ok(user)
            }
            Err(e) => self.fail(SIGN_IN_FALLBACK, e),
        }
    }

    /// End the session. The page always returns to the sign-in view; a
    /// provider failure is reported as a non-fatal message.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let outcome = match &self.provider {
            Some(provider) => provider.sign_out().await,
            None => Ok(()),
        };

        self.write_state().reset(self.config.clear_form_on_sign_out);

        match outcome {
            Ok(()) => {
                info!("User signed out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Provider sign-out failed");
                self.fail(SIGN_OUT_FALLBACK, e)
            }
        }
    }

    /// Restore the signed-in view from an existing provider session.
    /// Returns `Ok(false)` when there is nothing to restore.
    pub async fn rehydrate(&self) -> Result<bool, AuthError> {
        let Some(provider) = &self.provider else {
            return Ok(false);
        };
        let _loading = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return self.fail(SIGN_IN_FALLBACK, e),
        };

        let identity = match provider.current_user().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Ok(false),
            Err(e) => return self.fail(SIGN_IN_FALLBACK, e),
        };
        let caller = identity_caller(&identity);

        let user = match self.lookup_record(&caller, &identity).await {
            Ok(Some(record)) => match SessionUser::merge(&identity, record) {
                Ok(user) => self.attach_profile(&caller, user).await,
                Err(e) => Err(e),
            },
            Ok(None) => {
                warn!(
                    username = %identity.username,
                    "Provider session has no user record; releasing it"
                );
                self.release_provider_session(provider).await;
                return Ok(false);
            }
            Err(e) => Err(e),
        };

        match user {
            Ok(user) => {
                info!(username = %user.username, "Session rehydrated");
                self.write_state().enter_signed_in(user);
                Ok(true)
            }
            Err(e) => {
                self.release_provider_session(provider).await;
                self.fail(SIGN_IN_FALLBACK, e)
            }
        }
    }

    /// Create or update the signed-in user's profile.
    pub async fn save_profile(&self, input: ProfileInput) -> Result<UserProfile, AuthError> {
        self.dismiss_error();
        let user_id = self.read_state().user.as_ref().map(|u| u.user_id);
        let Some(user_id) = user_id else {
            return self.fail(PROFILE_FALLBACK, AuthError::NotSignedIn);
        };
        let _loading = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return self.fail(PROFILE_FALLBACK, e),
        };

        match self.store_profile(user_id, input).await {
            Ok(profile) => {
                if let Some(user) = self.write_state().user.as_mut() {
                    user.profile = Some(profile.clone());
                }
                Ok(profile)
            }
            Err(e) => self.fail(PROFILE_FALLBACK, e),
        }
    }

    // -----------------------------------------------------------------------
    // Provider-backed steps
    // -----------------------------------------------------------------------

    async fn register_with_provider(
        &self,
        provider: &P,
        form: &FormData,
    ) -> Result<SessionUser, AuthError> {
        provider
            .sign_up(SignUpInput {
                username: form.username.clone(),
                password: form.password.clone(),
                attributes: UserAttributes {
                    email: form.email.clone(),
                    given_name: form.given_name.clone(),
                    family_name: form.family_name.clone(),
                },
                auto_sign_in: true,
            })
            .await?;

        let result = self.create_record_for_identity(provider, form).await;
        if let Err(e) = &result {
            warn!(
                username = %form.username,
                error = %e,
                "Identity registered without a user record; registration is unreconciled"
            );
            self.release_provider_session(provider).await;
        }
        result
    }

    async fn create_record_for_identity(
        &self,
        provider: &P,
        form: &FormData,
    ) -> Result<SessionUser, AuthError> {
        let identity = provider
            .current_user()
            .await?
            .ok_or(AuthError::NotSignedIn)?;
        let caller = identity_caller(&identity);

        let record = self
            .data
            .create_user(
                &caller,
                CreateUser {
                    id: Some(identity.user_id),
                    username: form.username.clone(),
                    email: form.email.clone(),
                    first_name: form.given_name.clone(),
                    last_name: form.family_name.clone(),
                    status: Some(UserStatus::Active),
                    roles: Some(self.config.default_roles.clone()),
                    ..Default::default()
                },
            )
            .await
            .into_result()?;

        SessionUser::merge(&identity, record)
    }

    async fn sign_in_with_provider(
        &self,
        provider: &P,
        form: &FormData,
    ) -> Result<SessionUser, AuthError> {
        provider.sign_in(&form.username, &form.password).await?;

        let result = self.load_signed_in_user(provider, &form.username).await;
        if result.is_err() {
            self.release_provider_session(provider).await;
        }
        result
    }

    async fn load_signed_in_user(
        &self,
        provider: &P,
        username: &str,
    ) -> Result<SessionUser, AuthError> {
        let (caller, identity, record) = self.resolve_record(provider).await?.ok_or_else(|| {
            AuthError::RecordNotFound {
                username: username.to_string(),
            }
        })?;

        let record = self.stamp_login(&caller, record).await?;
        let user = SessionUser::merge(&identity, record)?;
        self.attach_profile(&caller, user).await
    }

    /// The current identity and its data record, if both exist.
    async fn resolve_record(
        &self,
        provider: &P,
    ) -> Result<Option<(Caller, CurrentUser, User)>, AuthError> {
        let Some(identity) = provider.current_user().await? else {
            return Ok(None);
        };
        let caller = identity_caller(&identity);
        let record = self.lookup_record(&caller, &identity).await?;
        Ok(record.map(|record| (caller, identity, record)))
    }

    /// The data record for `identity`, by username or by identity id.
    async fn lookup_record(
        &self,
        caller: &Caller,
        identity: &CurrentUser,
    ) -> Result<Option<User>, AuthError> {
        let record = if self.config.requires_profile_lookup {
            self.data
                .list_users(caller, UserFilter::username(identity.username.clone()))
                .await
                .into_result()?
                .into_iter()
                .next()
        } else {
            let response = self.data.get_user(caller, identity.user_id).await;
            if response
                .errors
                .iter()
                .any(|e| e.kind == DataErrorKind::NotFound)
            {
                None
            } else {
                Some(response.into_result()?)
            }
        };
        Ok(record)
    }

    async fn release_provider_session(&self, provider: &P) {
        if let Err(e) = provider.sign_out().await {
            warn!(error = %e, "Failed to release provider session");
        }
    }

    // -----------------------------------------------------------------------
    // Provider-less steps
    // -----------------------------------------------------------------------

    /// Callers without an identity present the data service's API key.
    fn service_caller(&self) -> Caller {
        self.data
            .policy()
            .api_key_config()
            .map(|config| Caller::ApiKey(config.key.clone()))
            .unwrap_or(Caller::Anonymous)
    }

    async fn register_direct(&self, form: &FormData) -> Result<SessionUser, AuthError> {
        let caller = self.service_caller();

        let existing = self
            .data
            .list_users(&caller, UserFilter::username(form.username.clone()))
            .await
            .into_result()?;
        if !existing.is_empty() {
            return Err(AuthError::UsernameTaken);
        }

        let record = self
            .data
            .create_user(
                &caller,
                CreateUser {
                    username: form.username.clone(),
                    email: form.email.clone(),
                    password: Some(form.password.clone()),
                    first_name: form.given_name.clone(),
                    last_name: form.family_name.clone(),
                    status: Some(UserStatus::Active),
                    roles: Some(self.config.default_roles.clone()),
                    ..Default::default()
                },
            )
            .await
            .into_result()?;

        Ok(SessionUser::from_record(record))
    }

    async fn sign_in_direct(&self, form: &FormData) -> Result<SessionUser, AuthError> {
        let caller = self.service_caller();

        let record = self
            .data
            .list_users(&caller, UserFilter::username(form.username.clone()))
            .await
            .into_result()?
            .into_iter()
            .next()
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = record
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&form.password, hash, self.config.pepper.as_deref())? {
            return Err(AuthError::InvalidCredentials);
        }

        let record = self.stamp_login(&caller, record).await?;
        self.attach_profile(&caller, SessionUser::from_record(record)).await
    }

    // -----------------------------------------------------------------------
    // Shared steps
    // -----------------------------------------------------------------------

    async fn stamp_login(&self, caller: &Caller, record: User) -> Result<User, AuthError> {
        let last_login = next_login_timestamp(record.last_login, Utc::now());
        let updated = self
            .data
            .update_user(
                caller,
                record.id,
                UpdateUser {
                    last_login: Some(last_login),
                    ..Default::default()
                },
            )
            .await
            .into_result()?;
        Ok(updated)
    }

    async fn attach_profile(
        &self,
        caller: &Caller,
        mut user: SessionUser,
    ) -> Result<SessionUser, AuthError> {
        user.profile = self
            .data
            .get_profile_for_user(caller, user.user_id)
            .await
            .into_result()?;
        Ok(user)
    }

    async fn data_caller(&self) -> Result<Caller, AuthError> {
        match &self.provider {
            Some(provider) => provider
                .current_user()
                .await?
                .map(|identity| identity_caller(&identity))
                .ok_or(AuthError::NotSignedIn),
            None => Ok(self.service_caller()),
        }
    }

    async fn store_profile(
        &self,
        user_id: Uuid,
        input: ProfileInput,
    ) -> Result<UserProfile, AuthError> {
        let caller = self.data_caller().await?;

        let existing = self
            .data
            .get_profile_for_user(&caller, user_id)
            .await
            .into_result()?;

        let profile = match existing {
            Some(profile) => self
                .data
                .update_profile(
                    &caller,
                    profile.id,
                    UpdateUserProfile {
                        bio: Some(input.bio),
                        website: Some(input.website),
                        location: Some(input.location),
                    },
                )
                .await
                .into_result()?,
            None => self
                .data
                .create_profile(
                    &caller,
                    CreateUserProfile {
                        user_id,
                        bio: input.bio,
                        website: input.website,
                        location: input.location,
                        owner: None,
                    },
                )
                .await
                .into_result()?,
        };
        Ok(profile)
    }

    // -----------------------------------------------------------------------
    // State plumbing
    // -----------------------------------------------------------------------

    fn read_state(&self) -> RwLockReadGuard<'_, PageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, PageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the error banner and snapshot the form.
    fn take_form(&self) -> FormData {
        let mut state = self.write_state();
        state.error = None;
        state.form.clone()
    }

    fn begin(&self) -> Result<LoadingGuard<'_>, AuthError> {
        let mut state = self.write_state();
        if state.is_loading {
            return Err(AuthError::Busy);
        }
        state.is_loading = true;
        Ok(LoadingGuard { state: &self.state })
    }

    fn fail<T>(&self, fallback: &str, err: AuthError) -> Result<T, AuthError> {
        self.write_state().error = Some(error_message(&err, fallback));
        Err(err)
    }
}
