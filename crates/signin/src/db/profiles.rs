//! Profile repository.
//!
//! Queries are built at runtime (`sqlx::query_as` with `FromRow`) so the
//! crate compiles without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use social_signin_core::{Email, Provider, ProviderIds, ProviderUserId, Uid, UserProfile};

use super::RepositoryError;
use crate::services::{ProfileStore, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    uid: Uid,
    email: Option<String>,
    name: Option<String>,
    profile_photo_url: Option<String>,
    email_verified: bool,
    provider: Provider,
    created_at: DateTime<Utc>,
    last_sign_in_time: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LinkRow {
    provider: Provider,
    provider_user_id: ProviderUserId,
}

/// `PostgreSQL`-backed profile store.
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a profile and its provider links.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn get_profile(&self, uid: &Uid) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT uid, email, name, profile_photo_url, email_verified, provider,
                   created_at, last_sign_in_time
            FROM signin.user_profile
            WHERE uid = $1
            ",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let links = sqlx::query_as::<_, LinkRow>(
            r"
            SELECT provider, provider_user_id
            FROM signin.provider_link
            WHERE uid = $1
            ",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;

        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))?;

        let provider_ids: ProviderIds = links
            .into_iter()
            .map(|link| (link.provider, link.provider_user_id))
            .collect();

        Ok(Some(UserProfile {
            uid: row.uid,
            email,
            name: row.name,
            profile_photo_url: row.profile_photo_url,
            email_verified: row.email_verified,
            provider: row.provider,
            provider_ids,
            created_at: row.created_at,
            last_sign_in_time: row.last_sign_in_time,
        }))
    }

    /// Insert or replace a profile and upsert its provider links, in one
    /// transaction. Links for providers absent from `profile` are kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a constraint rejects the row.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, profile), fields(uid = %uid))]
    pub async fn upsert_profile(
        &self,
        uid: &Uid,
        profile: &UserProfile,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO signin.user_profile
                (uid, email, name, profile_photo_url, email_verified, provider,
                 created_at, last_sign_in_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (uid) DO UPDATE SET
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                profile_photo_url = EXCLUDED.profile_photo_url,
                email_verified = EXCLUDED.email_verified,
                provider = EXCLUDED.provider,
                last_sign_in_time = EXCLUDED.last_sign_in_time,
                updated_at = NOW()
            ",
        )
        .bind(uid)
        .bind(profile.email.as_ref().map(Email::as_str))
        .bind(profile.name.as_deref())
        .bind(profile.profile_photo_url.as_deref())
        .bind(profile.email_verified)
        .bind(profile.provider)
        .bind(profile.created_at)
        .bind(profile.last_sign_in_time)
        .execute(&mut *tx)
        .await
        .map_err(map_constraint)?;

        for (provider, provider_user_id) in &profile.provider_ids {
            sqlx::query(
                r"
                INSERT INTO signin.provider_link (uid, provider, provider_user_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (uid, provider) DO UPDATE SET
                    provider_user_id = EXCLUDED.provider_user_id
                ",
            )
            .bind(uid)
            .bind(*provider)
            .bind(provider_user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_constraint)?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn map_constraint(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_check_violation() || db_err.is_unique_violation())
    {
        return RepositoryError::Conflict(db_err.message().to_owned());
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get(&self, uid: &Uid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.get_profile(uid).await?)
    }

    async fn put(&self, uid: &Uid, profile: &UserProfile) -> Result<(), StoreError> {
        Ok(self.upsert_profile(uid, profile).await?)
    }
}
