//! Domain models for signdesk.
//!
//! `user` and `user_profile` live in the data service; `identity` and
//! `session` belong to the identity provider.

pub mod identity;
pub mod session;
pub mod user;
pub mod user_profile;
