//! The generated outputs artifact (`signdesk_outputs.json`) describing
//! where the data service lives and how clients authorize against it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use signdesk_core::AuthMode;

use crate::config::ConfigError;

pub const DEFAULT_API_KEY_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOutputs {
    pub version: String,
    #[serde(default)]
    pub data: Option<DataOutputs>,
    #[serde(default)]
    pub auth: Option<AuthOutputs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataOutputs {
    pub url: Option<String>,
    pub namespace: Option<String>,
    pub database: Option<String>,
    pub default_authorization_mode: AuthMode,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_expires_in_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthOutputs {
    pub password_policy: PasswordPolicy,
    #[serde(default)]
    pub username_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl ClientOutputs {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Outputs(e.to_string()))
    }

    /// Read the artifact at `path`. A missing file yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Outputs(format!("{}: {e}", path.display()))),
        }
    }

    pub fn api_key_expires_in_days(&self) -> i64 {
        self.data
            .as_ref()
            .and_then(|d| d.api_key_expires_in_days)
            .unwrap_or(DEFAULT_API_KEY_EXPIRY_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1",
        "data": {
            "url": "ws://127.0.0.1:8000",
            "namespace": "signdesk",
            "database": "demo",
            "default_authorization_mode": "apiKey",
            "api_key": "da2-sample",
            "api_key_expires_in_days": 7
        },
        "auth": {
            "password_policy": { "min_length": 6 },
            "username_attributes": ["email"]
        }
    }"#;

    #[test]
    fn parses_full_artifact() {
        let outputs = ClientOutputs::parse(SAMPLE).unwrap();
        let data = outputs.data.as_ref().unwrap();
        assert_eq!(data.default_authorization_mode, AuthMode::ApiKey);
        assert_eq!(data.api_key.as_deref(), Some("da2-sample"));
        assert_eq!(outputs.api_key_expires_in_days(), 7);
        assert_eq!(outputs.auth.unwrap().password_policy.min_length, 6);
    }

    #[test]
    fn sections_are_optional() {
        let outputs = ClientOutputs::parse(r#"{ "version": "1" }"#).unwrap();
        assert!(outputs.data.is_none());
        assert_eq!(outputs.api_key_expires_in_days(), DEFAULT_API_KEY_EXPIRY_DAYS);
    }

    #[test]
    fn user_pool_mode_uses_camel_case() {
        let outputs = ClientOutputs::parse(
            r#"{ "version": "1", "data": { "default_authorization_mode": "userPool" } }"#,
        )
        .unwrap();
        assert_eq!(
            outputs.data.unwrap().default_authorization_mode,
            AuthMode::UserPool
        );
    }

    #[test]
    fn malformed_artifact_is_a_config_error() {
        assert!(matches!(
            ClientOutputs::parse("{ not json"),
            Err(ConfigError::Outputs(_))
        ));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let loaded = ClientOutputs::load(Path::new("/nonexistent/signdesk_outputs.json")).unwrap();
        assert!(loaded.is_none());
    }
}
