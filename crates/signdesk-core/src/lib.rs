//! signdesk core: domain models, error taxonomy, repository traits,
//! the authorization policy table and the data-service client.

pub mod client;
pub mod error;
pub mod models;
pub mod policy;
pub mod repository;

pub use client::{DataClient, DataError, DataErrorKind, DataResponse};
pub use error::{SignDeskError, SignDeskResult};
pub use policy::{ApiKeyConfig, AuthMode, AuthorizationPolicy, Caller, Entity, Operation, Principal};
