//! Database operations for the sign-in `PostgreSQL` profile store.
//!
//! ## Tables
//!
//! - `signin.user_profile` - reconciled profiles keyed by uid
//! - `signin.provider_link` - provider user ids linked to each uid
//!
//! # Migrations
//!
//! Migrations are stored in `crates/signin/migrations/` and run via:
//! ```bash
//! cargo run -p social-signin-cli -- migrate
//! ```

pub mod profiles;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::services::StoreError;

pub use profiles::PgProfileStore;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DataCorruption(reason) => Self::Corrupt(reason),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_into_store_error() {
        let err: StoreError = RepositoryError::DataCorruption("bad email".to_string()).into();
        assert_eq!(err, StoreError::Corrupt("bad email".to_string()));

        let err: StoreError = RepositoryError::NotFound.into();
        assert_eq!(err, StoreError::Unavailable("not found".to_string()));
    }
}
