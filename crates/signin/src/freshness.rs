//! Apple credential freshness.
//!
//! Apple is the only provider that can report on a previously issued
//! credential. The tracker interprets that report and keeps the cached
//! credential in secure local storage in step with it:
//!
//! ```text
//! NO_CREDENTIAL --sign-in--> AUTHORIZED --check: not AUTHORIZED--> STALE
//!       ^                      |    ^                                |
//!       |                      +----+ refresh                        |
//!       +-------------------- local credential cleared <-------------+
//! ```

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use social_signin_core::{CredentialState, IdentityClaim, Provider, claim::non_blank};

use crate::models::{
    AppleCredential, FederatedIdentity, RawCredential, StoredAppleCredential, secure_keys,
};
use crate::normalize::{self, NormalizeError};
use crate::services::{ProviderSdk, SdkError, SecureLocalStore, StoreError};

/// Tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessState {
    NoCredential,
    Authorized,
    /// The provider no longer authorizes the cached credential.
    Stale,
}

/// Freshness tracker failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FreshnessError {
    /// Refresh requested without a cached Apple user subject.
    #[error("no stored apple credential")]
    NoStoredCredential,

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Result of a credential-state check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessCheck {
    /// What the provider reported, `None` when nothing was cached to check.
    pub reported: Option<CredentialState>,
    /// Whether the cached credential was deleted.
    pub invalidated: bool,
    pub state: FreshnessState,
}

/// Tracks the cached Apple credential.
#[derive(Debug)]
pub struct AppleCredentialTracker {
    state: Mutex<FreshnessState>,
}

impl Default for AppleCredentialTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AppleCredentialTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(FreshnessState::NoCredential),
        }
    }

    #[must_use]
    pub fn state(&self) -> FreshnessState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: FreshnessState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!(from = ?*state, to = ?next, "Apple credential state transition");
        }
        *state = next;
    }

    /// Initialize from secure storage at startup.
    ///
    /// A cached credential that cannot be decoded is deleted.
    ///
    /// # Errors
    ///
    /// Returns `FreshnessError::Store` if secure storage is unavailable.
    pub async fn restore(
        &self,
        store: &dyn SecureLocalStore,
    ) -> Result<FreshnessState, FreshnessError> {
        let next = match load(store).await {
            Ok(Some(_)) => FreshnessState::Authorized,
            Ok(None) => FreshnessState::NoCredential,
            Err(StoreError::Corrupt(reason)) => {
                warn!(%reason, "Discarding unreadable cached Apple credential");
                store.delete(secure_keys::APPLE_CREDENTIAL).await?;
                FreshnessState::NoCredential
            }
            Err(e) => return Err(e.into()),
        };
        self.set_state(next);
        Ok(next)
    }

    /// Cache the credential from a successful sign-in: `NO_CREDENTIAL -> AUTHORIZED`.
    ///
    /// # Errors
    ///
    /// Returns `FreshnessError::Store` if the credential cannot be written.
    pub async fn record_sign_in(
        &self,
        store: &dyn SecureLocalStore,
        credential: &StoredAppleCredential,
    ) -> Result<(), FreshnessError> {
        save(store, credential).await?;
        self.set_state(FreshnessState::Authorized);
        Ok(())
    }

    /// Query the provider for the cached credential and apply the result.
    ///
    /// Any state other than `AUTHORIZED` moves to `STALE`, deletes the cached
    /// credential and settles in `NO_CREDENTIAL`.
    ///
    /// # Errors
    ///
    /// Returns `FreshnessError::Sdk` if the state query fails and
    /// `FreshnessError::Store` if storage cannot be read or the stale
    /// credential cannot be deleted (the tracker then stays `STALE`).
    pub async fn check(
        &self,
        sdk: &dyn ProviderSdk,
        store: &dyn SecureLocalStore,
    ) -> Result<FreshnessCheck, FreshnessError> {
        let Some(stored) = load(store).await? else {
            self.set_state(FreshnessState::NoCredential);
            return Ok(FreshnessCheck {
                reported: None,
                invalidated: false,
                state: FreshnessState::NoCredential,
            });
        };

        let reported = sdk.credential_state(&stored.user).await?;
        if reported.is_authorized() {
            self.set_state(FreshnessState::Authorized);
            return Ok(FreshnessCheck {
                reported: Some(reported),
                invalidated: false,
                state: FreshnessState::Authorized,
            });
        }

        warn!(state = %reported, "Apple credential no longer authorized");
        self.set_state(FreshnessState::Stale);
        store.delete(secure_keys::APPLE_CREDENTIAL).await?;
        self.set_state(FreshnessState::NoCredential);
        info!("Cached Apple credential cleared");

        Ok(FreshnessCheck {
            reported: Some(reported),
            invalidated: true,
            state: FreshnessState::NoCredential,
        })
    }

    /// Replace the cached token with a fresh one from the provider.
    ///
    /// The new credential goes through normalization so a malformed token is
    /// never cached. State stays `AUTHORIZED`.
    ///
    /// # Errors
    ///
    /// Returns `FreshnessError::NoStoredCredential` if nothing is cached,
    /// `FreshnessError::Sdk` if the provider refuses, and
    /// `FreshnessError::Normalize` if the new credential is unusable.
    pub async fn refresh(
        &self,
        sdk: &dyn ProviderSdk,
        store: &dyn SecureLocalStore,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaim, FreshnessError> {
        let stored = load(store)
            .await?
            .ok_or(FreshnessError::NoStoredCredential)?;

        let credential = sdk.refresh_apple(&stored.user).await?;
        let claim = normalize::normalize(
            &RawCredential::Apple(credential.clone()),
            &FederatedIdentity::default(),
        )?;

        let mut next = cacheable(&credential, &claim, now)?;
        if next.authorization_code.is_none() {
            next.authorization_code = stored.authorization_code;
        }
        save(store, &next).await?;
        self.set_state(FreshnessState::Authorized);
        info!(provider = %Provider::Apple, "Apple credential refreshed");

        Ok(claim)
    }

    /// Forget the cached credential (sign-out).
    ///
    /// # Errors
    ///
    /// Returns `FreshnessError::Store` if the credential cannot be deleted.
    pub async fn clear(&self, store: &dyn SecureLocalStore) -> Result<(), FreshnessError> {
        store.delete(secure_keys::APPLE_CREDENTIAL).await?;
        self.set_state(FreshnessState::NoCredential);
        Ok(())
    }
}

/// The cacheable form of an Apple credential that has been normalized.
///
/// # Errors
///
/// Returns `NormalizeError::MissingIdentityToken` if the credential has no
/// identity token.
pub fn cacheable(
    credential: &AppleCredential,
    claim: &IdentityClaim,
    now: DateTime<Utc>,
) -> Result<StoredAppleCredential, NormalizeError> {
    let identity_token = non_blank(credential.identity_token.as_deref())
        .ok_or(NormalizeError::MissingIdentityToken(Provider::Apple))?;
    // State queries must target the subject recorded in `providerIds`.
    let user = claim.provider_user_id.as_str();
    if let Some(reported) = non_blank(credential.user.as_deref())
        && reported != user
    {
        warn!(%reported, subject = %user, "Apple SDK user differs from token subject");
    }

    Ok(StoredAppleCredential {
        user: user.to_owned(),
        identity_token: identity_token.to_owned(),
        authorization_code: non_blank(credential.authorization_code.as_deref())
            .map(str::to_owned),
        stored_at: now,
    })
}

async fn load(store: &dyn SecureLocalStore) -> Result<Option<StoredAppleCredential>, StoreError> {
    let Some(json) = store.get(secure_keys::APPLE_CREDENTIAL).await? else {
        return Ok(None);
    };
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|e| StoreError::Corrupt(format!("apple credential: {e}")))
}

async fn save(
    store: &dyn SecureLocalStore,
    credential: &StoredAppleCredential,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(credential)
        .map_err(|e| StoreError::Corrupt(format!("apple credential: {e}")))?;
    store.set(secure_keys::APPLE_CREDENTIAL, &json).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::normalize::id_token::tests::token_for;
    use crate::sdk::ProviderSettings;
    use crate::services::memory::MemorySecureStore;

    struct StubSdk {
        state: CredentialState,
        refreshed_token: Option<String>,
        queries: AtomicUsize,
    }

    impl StubSdk {
        fn reporting(state: CredentialState) -> Self {
            Self {
                state,
                refreshed_token: None,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderSdk for StubSdk {
        async fn configure(&self, _settings: &ProviderSettings) -> Result<(), SdkError> {
            Ok(())
        }

        async fn sign_in(&self, _provider: Provider) -> Result<RawCredential, SdkError> {
            Err(SdkError::UserCancelled)
        }

        async fn credential_state(&self, subject: &str) -> Result<CredentialState, SdkError> {
            assert_eq!(subject, "a1");
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.state)
        }

        async fn refresh_apple(&self, subject: &str) -> Result<AppleCredential, SdkError> {
            Ok(AppleCredential {
                user: Some(subject.to_owned()),
                identity_token: self.refreshed_token.clone(),
                authorization_code: None,
                full_name: None,
                email: None,
                nonce: None,
                obtained_at: now(),
            })
        }

        async fn sign_out(&self, _provider: Provider) -> Result<(), SdkError> {
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 24, 10, 0, 0).unwrap()
    }

    fn stored() -> StoredAppleCredential {
        StoredAppleCredential {
            user: "a1".to_owned(),
            identity_token: "old.token.sig".to_owned(),
            authorization_code: Some("c0de".to_owned()),
            stored_at: now(),
        }
    }

    async fn authorized(store: &MemorySecureStore) -> AppleCredentialTracker {
        let tracker = AppleCredentialTracker::new();
        tracker.record_sign_in(store, &stored()).await.unwrap();
        tracker
    }

    #[test]
    fn test_cacheable_keys_on_token_subject() {
        let token = token_for(&serde_json::json!({"sub": "a1", "exp": 1_769_252_400}));
        let credential = AppleCredential {
            user: Some("sdk-reported".to_owned()),
            identity_token: Some(token.clone()),
            authorization_code: None,
            full_name: None,
            email: None,
            nonce: None,
            obtained_at: now(),
        };
        let claim = normalize::normalize(
            &RawCredential::Apple(credential.clone()),
            &FederatedIdentity::default(),
        )
        .unwrap();

        let stored = cacheable(&credential, &claim, now()).unwrap();
        assert_eq!(stored.user, "a1");
        assert_eq!(stored.identity_token, token);
    }

    #[tokio::test]
    async fn test_restore() {
        let store = MemorySecureStore::new();
        let tracker = AppleCredentialTracker::new();
        assert_eq!(tracker.restore(&store).await.unwrap(), FreshnessState::NoCredential);

        save(&store, &stored()).await.unwrap();
        assert_eq!(tracker.restore(&store).await.unwrap(), FreshnessState::Authorized);
    }

    #[tokio::test]
    async fn test_restore_discards_corrupt_cache() {
        let store = MemorySecureStore::new();
        store.set(secure_keys::APPLE_CREDENTIAL, "{not json").await.unwrap();
        let tracker = AppleCredentialTracker::new();
        assert_eq!(tracker.restore(&store).await.unwrap(), FreshnessState::NoCredential);
        assert!(!store.contains(secure_keys::APPLE_CREDENTIAL));
    }

    #[tokio::test]
    async fn test_authorized_check_keeps_credential() {
        let store = MemorySecureStore::new();
        let tracker = authorized(&store).await;
        let sdk = StubSdk::reporting(CredentialState::Authorized);

        let check = tracker.check(&sdk, &store).await.unwrap();
        assert!(!check.invalidated);
        assert_eq!(check.state, FreshnessState::Authorized);
        assert!(store.contains(secure_keys::APPLE_CREDENTIAL));
    }

    #[tokio::test]
    async fn test_every_other_state_invalidates() {
        for reported in [
            CredentialState::Revoked,
            CredentialState::NotFound,
            CredentialState::Transferred,
            CredentialState::Unknown,
        ] {
            let store = MemorySecureStore::new();
            let tracker = authorized(&store).await;
            let sdk = StubSdk::reporting(reported);

            let check = tracker.check(&sdk, &store).await.unwrap();
            assert_eq!(check.reported, Some(reported));
            assert!(check.invalidated, "{reported} must invalidate");
            assert_eq!(tracker.state(), FreshnessState::NoCredential);
            assert!(!store.contains(secure_keys::APPLE_CREDENTIAL));

            // Nothing left to check.
            let again = tracker.check(&sdk, &store).await.unwrap();
            assert!(!again.invalidated);
            assert_eq!(sdk.queries.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_refresh_requires_stored_credential() {
        let store = MemorySecureStore::new();
        let tracker = AppleCredentialTracker::new();
        let sdk = StubSdk::reporting(CredentialState::Authorized);
        let err = tracker.refresh(&sdk, &store, now()).await.unwrap_err();
        assert_eq!(err, FreshnessError::NoStoredCredential);
    }

    #[tokio::test]
    async fn test_refresh_replaces_token() {
        let store = MemorySecureStore::new();
        let tracker = authorized(&store).await;
        let new_token = token_for(&serde_json::json!({"sub": "a1", "exp": 1_769_252_400}));
        let sdk = StubSdk {
            refreshed_token: Some(new_token.clone()),
            ..StubSdk::reporting(CredentialState::Authorized)
        };

        let claim = tracker.refresh(&sdk, &store, now()).await.unwrap();
        assert_eq!(claim.provider_user_id.as_str(), "a1");
        assert_eq!(tracker.state(), FreshnessState::Authorized);

        let cached = load(&store).await.unwrap().unwrap();
        assert_eq!(cached.identity_token, new_token);
        assert_eq!(cached.authorization_code.as_deref(), Some("c0de"));
    }

    #[tokio::test]
    async fn test_refresh_rejects_malformed_token() {
        let store = MemorySecureStore::new();
        let tracker = authorized(&store).await;
        let sdk = StubSdk {
            refreshed_token: Some("garbage".to_owned()),
            ..StubSdk::reporting(CredentialState::Authorized)
        };

        let err = tracker.refresh(&sdk, &store, now()).await.unwrap_err();
        assert!(matches!(err, FreshnessError::Normalize(NormalizeError::MalformedToken(_))));
        assert_eq!(load(&store).await.unwrap().unwrap().identity_token, "old.token.sig");
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemorySecureStore::new();
        let tracker = authorized(&store).await;
        tracker.clear(&store).await.unwrap();
        assert_eq!(tracker.state(), FreshnessState::NoCredential);
        assert!(!store.contains(secure_keys::APPLE_CREDENTIAL));
    }
}
