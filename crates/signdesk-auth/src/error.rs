//! Authentication error types.

use signdesk_core::error::SignDeskError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("There is already a signed in user")]
    AlreadySignedIn,

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("No user record found for {username}")]
    RecordNotFound { username: String },

    #[error("Identity {identity} does not match user record {record}")]
    IdentityMismatch { identity: String, record: String },

    #[error("Another request is already in progress")]
    Busy,

    #[error("cryptography error: {0}")]
    Crypto(String),

    /// Failure reported by the data service or a repository.
    #[error(transparent)]
    Service(#[from] SignDeskError),
}

impl From<AuthError> for SignDeskError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Service(inner) => inner,
            AuthError::PasswordTooShort { .. } | AuthError::MissingField(_) | AuthError::Busy => {
                SignDeskError::Validation {
                    message: err.to_string(),
                }
            }
            AuthError::RecordNotFound { username } => SignDeskError::NotFound {
                entity: "user".into(),
                id: format!("username={username}"),
            },
            AuthError::Crypto(msg) => SignDeskError::Crypto(msg),
            AuthError::InvalidCredentials
            | AuthError::UsernameTaken
            | AuthError::UserAlreadyExists
            | AuthError::AlreadySignedIn
            | AuthError::NotSignedIn
            | AuthError::IdentityMismatch { .. } => SignDeskError::AuthenticationFailed {
                reason: err.to_string(),
            },
        }
    }
}
