//! Device-local persistence of the provider session token.

use std::io::ErrorKind;
use std::path::PathBuf;

use signdesk_auth::provider::{LocalIdentityProvider, NoIdentityProvider};
use signdesk_core::repository::{IdentityRepository, SessionRepository};
use tracing::debug;

/// Providers whose session survives a restart through a stored token.
pub trait PersistentSession {
    fn session_token(&self) -> Option<String>;
}

impl<I: IdentityRepository, S: SessionRepository> PersistentSession for LocalIdentityProvider<I, S> {
    fn session_token(&self) -> Option<String> {
        LocalIdentityProvider::session_token(self)
    }
}

impl PersistentSession for NoIdentityProvider {
    fn session_token(&self) -> Option<String> {
        match *self {}
    }
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The stored token, if any.
    pub async fn load(&self) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim().to_string();
                Ok((!token.is_empty()).then_some(token))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `token`, or remove the file when there is none.
    pub async fn store(&self, token: Option<&str>) -> std::io::Result<()> {
        match token {
            Some(token) => tokio::fs::write(&self.path, token).await,
            None => match tokio::fs::remove_file(&self.path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
                _ => {
                    debug!(path = %self.path.display(), "Session file cleared");
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("signdesk-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn store_then_load() {
        let file = SessionFile::new(temp_path("store"));
        assert_eq!(file.load().await.unwrap(), None);

        file.store(Some("token-123")).await.unwrap();
        assert_eq!(file.load().await.unwrap().as_deref(), Some("token-123"));

        file.store(None).await.unwrap();
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn clearing_a_missing_file_is_fine() {
        let file = SessionFile::new(temp_path("missing"));
        file.store(None).await.unwrap();
    }
}
