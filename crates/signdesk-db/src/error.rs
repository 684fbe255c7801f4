//! Database-specific error types and conversions.

use signdesk_core::error::SignDeskError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Write to {entity} failed: {message}")]
    Write { entity: String, message: String },

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String },

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl DbError {
    /// Classify a failed write, separating unique-index violations from
    /// other database errors.
    pub(crate) fn from_write(entity: &str, message: String) -> Self {
        if message.contains("already contains") {
            DbError::Conflict {
                entity: entity.into(),
            }
        } else {
            DbError::Write {
                entity: entity.into(),
                message,
            }
        }
    }
}

impl From<DbError> for SignDeskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SignDeskError::NotFound { entity, id },
            DbError::Conflict { entity } => SignDeskError::AlreadyExists { entity },
            DbError::Hash(msg) => SignDeskError::Crypto(msg),
            other => SignDeskError::Database(other.to_string()),
        }
    }
}
