//! signdesk: terminal sign-up/sign-in page.

mod config;
mod outputs;
mod page;
mod session_file;

use anyhow::Context;
use signdesk_auth::{AuthController, IdentityProvider, LocalIdentityProvider};
use signdesk_core::DataClient;
use signdesk_core::repository::{UserProfileRepository, UserRepository};
use signdesk_db::repository::{
    SurrealIdentityRepository, SurrealSessionRepository, SurrealUserProfileRepository,
    SurrealUserRepository,
};
use signdesk_db::{DbManager, run_migrations};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::outputs::ClientOutputs;
use crate::page::Page;
use crate::session_file::{PersistentSession, SessionFile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The page owns stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("signdesk=info".parse()?))
        .json()
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env()?;
    let outputs = ClientOutputs::load(&config.outputs_path)
        .with_context(|| format!("reading {}", config.outputs_path.display()))?;
    match &outputs {
        Some(outputs) => {
            info!(version = %outputs.version, "Loaded client outputs");
            config.apply_outputs(outputs);
        }
        None => warn!(
            path = %config.outputs_path.display(),
            "No outputs artifact found; using environment settings"
        ),
    }

    info!(environment = ?config.environment, url = %config.db.url, "Starting signdesk");

    let manager = DbManager::connect(&config.db)
        .await
        .context("connecting to SurrealDB")?;
    let db = manager.client().clone();
    run_migrations(&db).await.context("running migrations")?;

    let auth_config = config.auth_config(outputs.as_ref());
    let users = match &config.pepper {
        Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
        None => SurrealUserRepository::new(db.clone()),
    };
    let data = DataClient::new(
        users,
        SurrealUserProfileRepository::new(db.clone()),
        config.authorization_policy(outputs.as_ref()),
    );
    let session_file = SessionFile::new(config.session_file.clone());

    if config.identity_provider {
        let identities = match &config.pepper {
            Some(pepper) => SurrealIdentityRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealIdentityRepository::new(db.clone()),
        };
        let provider = LocalIdentityProvider::new(
            identities,
            SurrealSessionRepository::new(db),
            auth_config.clone(),
        );
        match provider.cleanup_expired_sessions().await {
            Ok(removed) if removed > 0 => info!(removed, "Removed expired sessions"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Expired session cleanup failed"),
        }
        if let Some(token) = session_file.load().await? {
            provider.restore_session(token);
        }
        serve(&AuthController::new(provider, data, auth_config), &session_file).await?;
    } else {
        info!("Identity provider disabled; data service calls use the public key");
        serve(&AuthController::without_provider(data, auth_config), &session_file).await?;
    }

    info!("signdesk stopped");
    Ok(())
}

async fn serve<P, U, R>(
    controller: &AuthController<P, U, R>,
    session_file: &SessionFile,
) -> anyhow::Result<()>
where
    P: IdentityProvider + PersistentSession,
    U: UserRepository,
    R: UserProfileRepository,
{
    match controller.rehydrate().await {
        Ok(true) => {}
        Ok(false) => session_file.store(None).await?,
        Err(e) => {
            warn!(error = %e, "Could not restore the previous session");
            session_file.store(None).await?;
        }
    }

    let mut input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    Page::new(controller, session_file)
        .run(&mut input, &mut output)
        .await?;
    Ok(())
}
