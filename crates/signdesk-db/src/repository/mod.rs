//! SurrealDB repository implementations.

mod identity;
mod session;
mod user;
mod user_profile;

pub use identity::SurrealIdentityRepository;
pub use session::SurrealSessionRepository;
pub use user::SurrealUserRepository;
pub use user_profile::SurrealUserProfileRepository;
