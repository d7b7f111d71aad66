//! Profile inspection commands.
//!
//! # Environment Variables
//!
//! - `SIGNIN_DATABASE_URL` - `PostgreSQL` connection string for the profile store

use social_signin::ConfigError;
use social_signin::config::database_url_from_env;
use social_signin::db::{RepositoryError, create_pool, profiles::PgProfileStore};
use social_signin_core::{IdError, Uid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid uid: {0}")]
    Uid(#[from] IdError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("No profile stored for uid {0}")]
    NotFound(Uid),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Print the stored profile for `uid`.
///
/// # Errors
///
/// Returns `ProfileError::NotFound` when no profile exists, or the
/// configuration / database failure.
pub async fn show(uid: &str) -> Result<(), ProfileError> {
    dotenvy::dotenv().ok();

    let uid = Uid::parse(uid)?;
    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to profile database...");
    let store = PgProfileStore::new(create_pool(&database_url).await?);

    let Some(profile) = store.get_profile(&uid).await? else {
        return Err(ProfileError::NotFound(uid));
    };
    super::emit(&profile)?;
    Ok(())
}
