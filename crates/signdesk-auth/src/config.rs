//! Authentication configuration.

/// Configuration for the identity provider and the auth page controller.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id verification.
    /// Must match the pepper the repositories hash with.
    pub pepper: Option<String>,
    /// Minimum password length checked before any external call.
    pub min_password_length: usize,
    /// Provider session lifetime in seconds (default: 2_592_000 = 30 days).
    pub session_lifetime_secs: u64,
    /// Resolve the signed-in user's record by username rather than by id.
    pub requires_profile_lookup: bool,
    /// Clear the form fields on sign-out.
    pub clear_form_on_sign_out: bool,
    /// Roles stored on records created at sign-up.
    pub default_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            min_password_length: 8,
            session_lifetime_secs: 2_592_000,
            requires_profile_lookup: true,
            clear_form_on_sign_out: true,
            default_roles: signdesk_core::models::user::DEFAULT_ROLES
                .iter()
                .map(|r| r.to_string())
                .collect(),
        }
    }
}
