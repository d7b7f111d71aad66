//! Sign-in orchestration.
//!
//! One fixed pipeline for every provider:
//!
//! 1. provider SDK sign-in (cancel ends here, quietly)
//! 2. derive the exchange assertion from the raw credential; Apple tokens
//!    are decoded here so an unreadable one never reaches the backend
//! 3. backend exchange for `{token, uid}`
//! 4. normalize into an [`IdentityClaim`]
//! 5. read the stored profile, reconcile, write it back once
//! 6. cache the Apple credential, notify the session
//!
//! Any failure before step 5 short-circuits with nothing written. A failed
//! profile write is logged and the session proceeds with the computed
//! profile.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{Span, field, info, instrument, warn};

use social_signin_core::{Email, IdentityClaim, Provider, Uid, UserProfile};

use crate::error::SignInError;
use crate::freshness::{self, AppleCredentialTracker, FreshnessCheck, FreshnessState};
use crate::models::{
    FederatedIdentity, IdpAssertion, RawCredential, SignInOutcome, SignInSession,
};
use crate::normalize;
use crate::reconcile;
use crate::sdk::ConfiguredSdk;
use crate::services::{
    Clock, IdentityExchange, ProfileStore, ProviderSdk, SdkError, SecureLocalStore,
    SessionContext, SignInSurface, SystemClock,
};
use crate::telemetry;

/// Collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub exchange: Arc<dyn IdentityExchange>,
    pub profiles: Arc<dyn ProfileStore>,
    pub secure_store: Arc<dyn SecureLocalStore>,
    pub session: Arc<dyn SessionContext>,
    pub surface: Arc<dyn SignInSurface>,
}

/// Runs sign-in, sign-out and Apple credential maintenance.
pub struct SignInOrchestrator<S> {
    sdk: ConfiguredSdk<S>,
    exchange: Arc<dyn IdentityExchange>,
    profiles: Arc<dyn ProfileStore>,
    secure_store: Arc<dyn SecureLocalStore>,
    session: Arc<dyn SessionContext>,
    surface: Arc<dyn SignInSurface>,
    clock: Arc<dyn Clock>,
    apple: AppleCredentialTracker,
    in_flight: Mutex<BTreeSet<Provider>>,
}

impl<S: ProviderSdk> SignInOrchestrator<S> {
    #[must_use]
    pub fn new(sdk: ConfiguredSdk<S>, collaborators: Collaborators) -> Self {
        let Collaborators {
            exchange,
            profiles,
            secure_store,
            session,
            surface,
        } = collaborators;
        Self {
            sdk,
            exchange,
            profiles,
            secure_store,
            session,
            surface,
            clock: Arc::new(SystemClock),
            apple: AppleCredentialTracker::new(),
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configured provider SDK.
    #[must_use]
    pub const fn sdk(&self) -> &ConfiguredSdk<S> {
        &self.sdk
    }

    #[must_use]
    pub fn apple_state(&self) -> FreshnessState {
        self.apple.state()
    }

    /// Whether a sign-in for `provider` is running.
    #[must_use]
    pub fn is_in_flight(&self, provider: Provider) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&provider)
    }

    /// Load the cached Apple credential state. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns `SignInError::Freshness` if secure storage is unavailable.
    pub async fn restore(&self) -> Result<FreshnessState, SignInError> {
        Ok(self.apple.restore(self.secure_store.as_ref()).await?)
    }

    /// Sign in with `provider`.
    ///
    /// Returns `SignInOutcome::Cancelled` when the user dismisses the
    /// provider prompt.
    ///
    /// # Errors
    ///
    /// - `SignInError::AlreadyInFlight` if a sign-in for `provider` is running
    /// - `SignInError::TransientProvider` for SDK network or availability errors
    /// - `SignInError::Normalization` if the credential is unusable
    /// - `SignInError::BackendExchange` if the backend refuses the credential
    /// - `SignInError::Reconcile` if the claim is invalid
    #[instrument(skip(self), fields(provider = %provider, uid = field::Empty))]
    pub async fn sign_in(&self, provider: Provider) -> Result<SignInOutcome, SignInError> {
        let _guard = self.begin(provider)?;

        let raw = match self.sdk.sign_in(provider).await {
            Ok(raw) => raw,
            Err(SdkError::UserCancelled) => {
                info!("Sign-in cancelled by user");
                return Ok(SignInOutcome::Cancelled);
            }
            Err(e) => {
                warn!(error = %e, stage = "sdk", "Provider sign-in failed");
                return Err(SignInError::from_sdk(provider, e));
            }
        };
        if raw.provider() != provider {
            return Err(SignInError::from_sdk(
                provider,
                SdkError::Provider(format!("SDK returned a {} credential", raw.provider())),
            ));
        }

        let assertion = IdpAssertion::from_credential(&raw).inspect_err(|e| {
            warn!(error = %e, stage = "assertion", "Credential rejected");
        })?;
        // A token this layer decodes must be readable before it reaches the backend.
        if provider.decodes_identity_token_locally() {
            normalize::normalize(&raw, &FederatedIdentity::default()).inspect_err(|e| {
                warn!(error = %e, stage = "normalize", "Credential rejected");
            })?;
        }

        let exchanged = self.exchange.exchange(&assertion).await.map_err(|e| {
            warn!(error = %e, stage = "exchange", "Identity exchange failed");
            SignInError::from_exchange(provider, e)
        })?;
        let uid = exchanged.uid;
        Span::current().record("uid", field::display(&uid));

        let claim = normalize::normalize(&raw, &exchanged.federated).inspect_err(|e| {
            warn!(error = %e, stage = "normalize", "Credential rejected");
        })?;

        let now = self.clock.now();
        let (profile, persisted) = self.reconcile_and_store(&uid, &claim, now).await?;

        if let RawCredential::Apple(credential) = &raw {
            match freshness::cacheable(credential, &claim, now) {
                Ok(stored) => {
                    if let Err(e) = self
                        .apple
                        .record_sign_in(self.secure_store.as_ref(), &stored)
                        .await
                    {
                        warn!(error = %e, stage = "cache", "Failed to cache Apple credential");
                    }
                }
                Err(e) => warn!(error = %e, stage = "cache", "Apple credential not cacheable"),
            }
        }

        let session = SignInSession {
            provider,
            uid,
            token: exchanged.token,
            profile,
            claim,
            persisted,
        };
        self.session.signed_in(&session).await;
        telemetry::set_sentry_user(&session.uid, session.profile.email.as_ref().map(Email::as_str));
        info!(persisted, "Sign-in complete");

        Ok(SignInOutcome::SignedIn(Box::new(session)))
    }

    /// Read, reconcile and write the profile.
    ///
    /// A failed read reconciles against "absent" and skips the write, so a
    /// stored profile is never replaced by one built without it.
    async fn reconcile_and_store(
        &self,
        uid: &Uid,
        claim: &IdentityClaim,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(UserProfile, bool), SignInError> {
        let (existing, readable) = match self.profiles.get(uid).await {
            Ok(existing) => (existing, true),
            Err(e) => {
                warn!(error = %e, stage = "profile_read", "Profile read failed, continuing without stored profile");
                (None, false)
            }
        };

        let profile = reconcile::reconcile_at(uid, claim, existing.as_ref(), now)?;

        if !readable {
            warn!(stage = "profile_write", "Profile write skipped after failed read");
            return Ok((profile, false));
        }

        let persisted = match self.profiles.put(uid, &profile).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, stage = "profile_write", "Profile write failed, session continues");
                false
            }
        };
        Ok((profile, persisted))
    }

    /// Sign out of `provider`.
    ///
    /// Local state is always cleared: the cached Apple credential, the
    /// session and the Sentry user.
    ///
    /// # Errors
    ///
    /// Returns `SignInError::TransientProvider` if the SDK sign-out failed and
    /// `SignInError::Freshness` if the Apple cache could not be cleared.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn sign_out(&self, provider: Provider) -> Result<(), SignInError> {
        let sdk_result = self.sdk.sign_out(provider).await;
        if let Err(e) = &sdk_result {
            warn!(error = %e, "Provider sign-out failed");
        }

        let cache_result = if provider.reports_credential_state() {
            self.apple.clear(self.secure_store.as_ref()).await
        } else {
            Ok(())
        };

        self.session.signed_out(provider).await;
        telemetry::clear_sentry_user();
        info!("Signed out");

        sdk_result.map_err(|e| SignInError::from_sdk(provider, e))?;
        cache_result?;
        Ok(())
    }

    /// Resume-time Apple credential check.
    ///
    /// A credential Apple no longer authorizes is deleted and the session is
    /// signed out.
    ///
    /// # Errors
    ///
    /// Returns `SignInError::Freshness` if the state query or storage fails.
    #[instrument(skip(self))]
    pub async fn check_apple_credential(&self) -> Result<FreshnessCheck, SignInError> {
        let check = self
            .apple
            .check(&*self.sdk, self.secure_store.as_ref())
            .await?;
        if check.invalidated {
            self.session.signed_out(Provider::Apple).await;
            telemetry::clear_sentry_user();
        }
        Ok(check)
    }

    /// Replace the cached Apple token with a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `SignInError::Freshness` wrapping `NoStoredCredential` when
    /// nothing is cached, or the SDK / normalization failure.
    #[instrument(skip(self))]
    pub async fn refresh_apple_credential(&self) -> Result<IdentityClaim, SignInError> {
        let now = self.clock.now();
        Ok(self
            .apple
            .refresh(&*self.sdk, self.secure_store.as_ref(), now)
            .await?)
    }

    fn begin(&self, provider: Provider) -> Result<InFlightGuard<'_>, SignInError> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider);
        if !inserted {
            return Err(SignInError::AlreadyInFlight(provider));
        }
        if self.surface.is_mounted() {
            self.surface.set_loading(provider, true);
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            surface: self.surface.as_ref(),
            provider,
        })
    }
}

/// Releases the per-provider in-flight flag on every exit path.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<BTreeSet<Provider>>,
    surface: &'a dyn SignInSurface,
    provider: Provider,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.provider);
        if self.surface.is_mounted() {
            self.surface.set_loading(self.provider, false);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use social_signin_core::CredentialState;

    use super::*;
    use crate::config::{
        AppleConfig, FacebookConfig, GoogleConfig, IdentityToolkitConfig, SignInConfig,
        TelemetryConfig,
    };
    use crate::models::{AppleCredential, GoogleCredential};
    use crate::normalize::id_token::tests::token_for;
    use crate::sdk::{ProviderSettings, configure_providers};
    use crate::services::FixedClock;
    use crate::services::memory::{LocalIdentityExchange, MemoryProfileStore, MemorySecureStore};

    struct OneShotSdk(Result<RawCredential, SdkError>);

    #[async_trait]
    impl ProviderSdk for OneShotSdk {
        async fn configure(&self, _settings: &ProviderSettings) -> Result<(), SdkError> {
            Ok(())
        }

        async fn sign_in(&self, _provider: Provider) -> Result<RawCredential, SdkError> {
            self.0.clone()
        }

        async fn credential_state(&self, _subject: &str) -> Result<CredentialState, SdkError> {
            Ok(CredentialState::Authorized)
        }

        async fn refresh_apple(&self, _subject: &str) -> Result<AppleCredential, SdkError> {
            Err(SdkError::UserCancelled)
        }

        async fn sign_out(&self, _provider: Provider) -> Result<(), SdkError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSession {
        signed_in: AtomicUsize,
    }

    #[async_trait]
    impl SessionContext for CountingSession {
        async fn signed_in(&self, _session: &SignInSession) {
            self.signed_in.fetch_add(1, Ordering::SeqCst);
        }

        async fn signed_out(&self, _provider: Provider) {}
    }

    struct Headless;

    impl SignInSurface for Headless {
        fn is_mounted(&self) -> bool {
            false
        }

        fn set_loading(&self, _provider: Provider, _loading: bool) {
            panic!("unmounted surface must not be touched");
        }
    }

    fn config() -> SignInConfig {
        SignInConfig {
            google: GoogleConfig {
                web_client_id: "web".to_owned(),
                ios_client_id: None,
            },
            facebook: FacebookConfig {
                app_id: "fb".to_owned(),
                client_token: None,
            },
            apple: AppleConfig {
                service_id: "com.pistachio.app".to_owned(),
            },
            identity_toolkit: IdentityToolkitConfig {
                api_key: secrecy::SecretString::from("key"),
                endpoint: "http://localhost".parse().unwrap(),
            },
            database_url: None,
            telemetry: TelemetryConfig::default(),
        }
    }

    async fn orchestrator(
        sdk: OneShotSdk,
        session: Arc<CountingSession>,
        profiles: Arc<MemoryProfileStore>,
    ) -> SignInOrchestrator<OneShotSdk> {
        let sdk = configure_providers(sdk, &config()).await.unwrap();
        SignInOrchestrator::new(
            sdk,
            Collaborators {
                exchange: Arc::new(LocalIdentityExchange::new()),
                profiles,
                secure_store: Arc::new(MemorySecureStore::new()),
                session,
                surface: Arc::new(Headless),
            },
        )
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 24, 10, 0, 0).unwrap(),
        )))
    }

    #[tokio::test]
    async fn test_cancel_is_not_an_error() {
        let session = Arc::new(CountingSession::default());
        let profiles = Arc::new(MemoryProfileStore::new());
        let orchestrator = orchestrator(
            OneShotSdk(Err(SdkError::UserCancelled)),
            Arc::clone(&session),
            Arc::clone(&profiles),
        )
        .await;

        let outcome = orchestrator.sign_in(Provider::Google).await.unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(session.signed_in.load(Ordering::SeqCst), 0);
        assert!(profiles.is_empty().await);
        assert!(!orchestrator.is_in_flight(Provider::Google));
    }

    #[tokio::test]
    async fn test_google_sign_in_persists_profile() {
        let token = token_for(&serde_json::json!({
            "sub": "g1",
            "email": "jo@gmail.com",
            "email_verified": true,
            "name": "Jo Bloggs"
        }));
        let raw = RawCredential::Google(GoogleCredential {
            id_token: Some(token),
            access_token: None,
            user_id: Some("g1".to_owned()),
            obtained_at: Utc::now(),
            expires_at: None,
        });
        let session = Arc::new(CountingSession::default());
        let profiles = Arc::new(MemoryProfileStore::new());
        let orchestrator =
            orchestrator(OneShotSdk(Ok(raw)), Arc::clone(&session), Arc::clone(&profiles)).await;

        let outcome = orchestrator.sign_in(Provider::Google).await.unwrap();
        let signed_in = outcome.into_session().unwrap();
        assert!(signed_in.persisted);
        assert_eq!(signed_in.profile.name.as_deref(), Some("Jo Bloggs"));
        assert!(signed_in.profile.email_verified);

        let stored = profiles.get(&signed_in.uid).await.unwrap().unwrap();
        assert_eq!(stored, signed_in.profile);
        assert_eq!(session.signed_in.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_sdk_error_is_retryable() {
        let orchestrator = orchestrator(
            OneShotSdk(Err(SdkError::Network("offline".to_owned()))),
            Arc::new(CountingSession::default()),
            Arc::new(MemoryProfileStore::new()),
        )
        .await;
        let err = orchestrator.sign_in(Provider::Facebook).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!orchestrator.is_in_flight(Provider::Facebook));
    }

    #[tokio::test]
    async fn test_mismatched_credential_rejected() {
        let raw = RawCredential::Google(GoogleCredential {
            id_token: Some("t".to_owned()),
            access_token: None,
            user_id: None,
            obtained_at: Utc::now(),
            expires_at: None,
        });
        let orchestrator = orchestrator(
            OneShotSdk(Ok(raw)),
            Arc::new(CountingSession::default()),
            Arc::new(MemoryProfileStore::new()),
        )
        .await;
        let err = orchestrator.sign_in(Provider::Apple).await.unwrap_err();
        assert!(matches!(
            err,
            SignInError::TransientProvider {
                source: SdkError::Provider(_),
                ..
            }
        ));
    }
}
