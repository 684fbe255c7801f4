//! signdesk database: SurrealDB connection management and repository
//! implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Argon2id credential hashing ([`hash_password`])
//! - Repository implementations for the `signdesk-core` traits
//! - Error types ([`DbError`])

mod connection;
mod error;
mod password;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use password::hash_password;
pub use schema::{latest_version, run_migrations};
