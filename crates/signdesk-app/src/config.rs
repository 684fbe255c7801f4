//! Application configuration loaded from environment variables and the
//! outputs artifact.

use std::env;
use std::path::PathBuf;

use signdesk_auth::AuthConfig;
use signdesk_core::{ApiKeyConfig, AuthMode, AuthorizationPolicy};
use signdesk_db::DbConfig;
use tracing::warn;
use uuid::Uuid;

use crate::outputs::ClientOutputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Outputs artifact error: {0}")]
    Outputs(String),
}

/// Settings read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub db: DbConfig,
    pub outputs_path: PathBuf,
    pub session_file: PathBuf,
    pub pepper: Option<String>,
    pub identity_provider: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            db: DbConfig::default(),
            outputs_path: PathBuf::from("signdesk_outputs.json"),
            session_file: PathBuf::from(".signdesk_session"),
            pepper: None,
            identity_provider: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment, reading `.env`
    /// first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let db_defaults = DbConfig::default();

        let identity_provider = match lookup("SIGNDESK_IDENTITY_PROVIDER") {
            Some(raw) => parse_bool("SIGNDESK_IDENTITY_PROVIDER", &raw)?,
            None => defaults.identity_provider,
        };

        Ok(Self {
            environment: lookup("SIGNDESK_ENV")
                .map(|raw| Environment::parse(&raw))
                .unwrap_or(defaults.environment),
            db: DbConfig {
                url: lookup("SIGNDESK_DB_URL").unwrap_or(db_defaults.url),
                namespace: lookup("SIGNDESK_DB_NAMESPACE").unwrap_or(db_defaults.namespace),
                database: lookup("SIGNDESK_DB_DATABASE").unwrap_or(db_defaults.database),
                username: lookup("SIGNDESK_DB_USER").unwrap_or(db_defaults.username),
                password: lookup("SIGNDESK_DB_PASS").unwrap_or(db_defaults.password),
            },
            outputs_path: lookup("SIGNDESK_OUTPUTS")
                .map(PathBuf::from)
                .unwrap_or(defaults.outputs_path),
            session_file: lookup("SIGNDESK_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            pepper: lookup("SIGNDESK_PEPPER").filter(|p| !p.is_empty()),
            identity_provider,
        })
    }

    /// Let values from the outputs artifact override the environment.
    pub fn apply_outputs(&mut self, outputs: &ClientOutputs) {
        if let Some(data) = &outputs.data {
            if let Some(url) = &data.url {
                self.db.url = url.clone();
            }
            if let Some(namespace) = &data.namespace {
                self.db.namespace = namespace.clone();
            }
            if let Some(database) = &data.database {
                self.db.database = database.clone();
            }
        }
    }

    pub fn auth_config(&self, outputs: Option<&ClientOutputs>) -> AuthConfig {
        let mut config = AuthConfig {
            pepper: self.pepper.clone(),
            ..Default::default()
        };
        if let Some(auth) = outputs.and_then(|o| o.auth.as_ref()) {
            config.min_password_length = auth.password_policy.min_length;
        }
        config
    }

    /// Authorization posture for the data service. The API-key window only
    /// opens in development; elsewhere public-key rules never match.
    pub fn authorization_policy(&self, outputs: Option<&ClientOutputs>) -> AuthorizationPolicy {
        let data = outputs.and_then(|o| o.data.as_ref());
        let mode = data
            .map(|d| d.default_authorization_mode)
            .unwrap_or(if self.identity_provider {
                AuthMode::UserPool
            } else {
                AuthMode::ApiKey
            });

        match (mode, self.environment) {
            (AuthMode::UserPool, _) => AuthorizationPolicy::user_pool(),
            (AuthMode::ApiKey, Environment::Development) => {
                let key = data
                    .and_then(|d| d.api_key.clone())
                    .unwrap_or_else(|| format!("da2-{}", Uuid::new_v4().simple()));
                let days = outputs
                    .map(ClientOutputs::api_key_expires_in_days)
                    .unwrap_or(crate::outputs::DEFAULT_API_KEY_EXPIRY_DAYS);
                AuthorizationPolicy::api_key(ApiKeyConfig::new(key, days))
            }
            (AuthMode::ApiKey, Environment::Production) => {
                warn!("API-key authorization is only available in development");
                AuthorizationPolicy::user_pool()
            }
        }
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn outputs(raw: &str) -> ClientOutputs {
        ClientOutputs::parse(raw).unwrap()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.db.url, "mem://");
        assert!(config.identity_provider);
        assert!(config.pepper.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SIGNDESK_ENV", "development"),
            ("SIGNDESK_DB_URL", "ws://db:8000"),
            ("SIGNDESK_DB_NAMESPACE", "ns"),
            ("SIGNDESK_DB_DATABASE", "app"),
            ("SIGNDESK_DB_USER", "admin"),
            ("SIGNDESK_DB_PASS", "secret"),
            ("SIGNDESK_OUTPUTS", "/etc/signdesk/outputs.json"),
            ("SIGNDESK_SESSION_FILE", "/tmp/session"),
            ("SIGNDESK_PEPPER", "pepper!"),
            ("SIGNDESK_IDENTITY_PROVIDER", "false"),
        ]))
        .unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.db.url, "ws://db:8000");
        assert_eq!(config.db.namespace, "ns");
        assert_eq!(config.db.database, "app");
        assert_eq!(config.db.username, "admin");
        assert_eq!(config.db.password, "secret");
        assert_eq!(config.outputs_path, PathBuf::from("/etc/signdesk/outputs.json"));
        assert_eq!(config.session_file, PathBuf::from("/tmp/session"));
        assert_eq!(config.pepper.as_deref(), Some("pepper!"));
        assert!(!config.identity_provider);
    }

    #[test]
    fn bad_boolean_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("SIGNDESK_IDENTITY_PROVIDER", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn outputs_override_database_settings() {
        let mut config = AppConfig::default();
        config.apply_outputs(&outputs(
            r#"{ "version": "1", "data": {
                "url": "ws://remote:8000", "database": "demo",
                "default_authorization_mode": "userPool" } }"#,
        ));
        assert_eq!(config.db.url, "ws://remote:8000");
        assert_eq!(config.db.database, "demo");
        assert_eq!(config.db.namespace, "signdesk");
    }

    #[test]
    fn password_policy_comes_from_outputs() {
        let config = AppConfig::default();
        let out = outputs(r#"{ "version": "1", "auth": { "password_policy": { "min_length": 6 } } }"#);
        assert_eq!(config.auth_config(Some(&out)).min_password_length, 6);
        assert_eq!(config.auth_config(None).min_password_length, 8);
    }

    #[test]
    fn api_key_window_opens_only_in_development() {
        let out = outputs(
            r#"{ "version": "1", "data": {
                "default_authorization_mode": "apiKey", "api_key": "da2-dev" } }"#,
        );

        let dev = AppConfig {
            environment: Environment::Development,
            identity_provider: false,
            ..Default::default()
        };
        let policy = dev.authorization_policy(Some(&out));
        assert_eq!(policy.default_mode, AuthMode::ApiKey);
        assert_eq!(policy.api_key_config().unwrap().key, "da2-dev");

        let prod = AppConfig {
            identity_provider: false,
            ..Default::default()
        };
        let policy = prod.authorization_policy(Some(&out));
        assert_eq!(policy.default_mode, AuthMode::UserPool);
        assert!(policy.api_key_config().is_none());
    }

    #[test]
    fn mode_defaults_follow_the_provider_switch() {
        let with_provider = AppConfig::default();
        assert_eq!(
            with_provider.authorization_policy(None).default_mode,
            AuthMode::UserPool
        );

        let without = AppConfig {
            environment: Environment::Development,
            identity_provider: false,
            ..Default::default()
        };
        let policy = without.authorization_policy(None);
        assert_eq!(policy.default_mode, AuthMode::ApiKey);
        assert!(policy.api_key_config().unwrap().key.starts_with("da2-"));
    }
}
