//! Error types for the signdesk system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignDeskError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("{reason}")]
    AuthenticationFailed { reason: String },

    #[error("Not authorized to {operation} {entity}")]
    AuthorizationDenied { entity: String, operation: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    /// Soft errors returned by the data service alongside (or instead of)
    /// a payload.
    #[error("{}", messages.join("; "))]
    DataService { messages: Vec<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SignDeskResult<T> = Result<T, SignDeskError>;
