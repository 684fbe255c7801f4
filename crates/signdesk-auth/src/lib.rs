//! signdesk auth: identity provider, credential checks, session tokens
//! and the auth page controller.

pub mod config;
pub mod controller;
pub mod error;
pub mod password;
pub mod provider;
pub mod token;

pub use config::AuthConfig;
pub use controller::{
    AuthController, AuthPhase, Capabilities, FormData, FormField, PageState, ProfileInput,
    SessionUser, Theme,
};
pub use error::AuthError;
pub use provider::{
    CurrentUser, IdentityProvider, LocalIdentityProvider, NoIdentityProvider, SignInDetails,
    SignInOutput, SignUpInput, SignUpOutput, UserAttributes,
};
