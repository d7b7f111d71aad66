//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! signin-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SIGNIN_DATABASE_URL` - `PostgreSQL` connection string for the profile store
//!
//! Migrations live in `crates/signin/migrations/`.

use social_signin::ConfigError;
use social_signin::config::database_url_from_env;
use social_signin::db::create_pool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the profile store migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing, the connection fails or a
/// migration does not apply.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to profile database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running sign-in migrations...");
    sqlx::migrate!("../signin/migrations").run(&pool).await?;

    tracing::info!("Sign-in migrations complete");
    Ok(())
}
