//! Test harness for end-to-end sign-in tests.
//!
//! Every collaborator the orchestrator drives has a scripted or recording
//! stand-in here, so the tests under `tests/` can run the full pipeline
//! without provider SDKs, a backend or a database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p social-signin-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::SecretString;
use tokio::sync::Notify;

use social_signin::config::{
    AppleConfig, FacebookConfig, GoogleConfig, IdentityToolkitConfig, SignInConfig,
    TelemetryConfig,
};
use social_signin::models::{
    AppleCredential, FacebookCredential, GoogleCredential, GraphPicture, GraphPictureData,
    GraphProfile, IdpAssertion, RawCredential, SignInSession,
};
use social_signin::services::memory::{
    LocalIdentityExchange, MemoryProfileStore, MemorySecureStore,
};
use social_signin::services::{
    Clock, ExchangeError, ExchangeResult, IdentityExchange, ProfileStore, ProviderSdk, SdkError,
    SecureLocalStore, SessionContext, SignInSurface, StoreError,
};
use social_signin::{Collaborators, ProviderSettings, SignInOrchestrator, configure_providers};
use social_signin_core::{CredentialState, PersonName, Provider, Uid, UserProfile};

// =============================================================================
// Fixtures
// =============================================================================

/// 2026-01-24 10:00:00 UTC.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 24, 10, 0, 0).unwrap()
}

/// Unsigned compact token carrying `payload`.
#[must_use]
pub fn id_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"test"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

#[must_use]
pub fn google(sub: &str, email: &str, name: &str) -> RawCredential {
    RawCredential::Google(GoogleCredential {
        id_token: Some(id_token(&serde_json::json!({
            "sub": sub,
            "email": email,
            "email_verified": true,
            "name": name,
            "picture": format!("https://lh3.example/{sub}.jpg"),
        }))),
        access_token: Some(format!("ya29.{sub}")),
        user_id: Some(sub.to_owned()),
        obtained_at: epoch(),
        expires_at: Some(epoch() + Duration::hours(1)),
    })
}

/// Facebook credential; the access token doubles as the exchange subject.
#[must_use]
pub fn facebook(id: &str, name: Option<&str>, picture: Option<&str>) -> RawCredential {
    RawCredential::Facebook(FacebookCredential {
        access_token: Some(facebook_token(id)),
        obtained_at: epoch(),
        expires_at: None,
        profile: GraphProfile {
            id: Some(id.to_owned()),
            name: name.map(str::to_owned),
            email: None,
            first_name: None,
            last_name: None,
            picture: picture.map(|url| GraphPicture {
                data: Some(GraphPictureData {
                    url: Some(url.to_owned()),
                    is_silhouette: Some(false),
                }),
            }),
        },
    })
}

#[must_use]
pub fn facebook_token(id: &str) -> String {
    format!("EAAB.{id}")
}

/// Apple credential whose identity token carries `sub` and `email`.
#[must_use]
pub fn apple(sub: &str, email: &str, given_name: Option<&str>) -> RawCredential {
    RawCredential::Apple(apple_credential(sub, email, given_name))
}

#[must_use]
pub fn apple_credential(sub: &str, email: &str, given_name: Option<&str>) -> AppleCredential {
    AppleCredential {
        user: Some(sub.to_owned()),
        identity_token: Some(id_token(&serde_json::json!({
            "iss": "https://appleid.apple.com",
            "aud": "com.pistachio.app",
            "sub": sub,
            "email": email,
            "email_verified": "true",
            "iat": epoch().timestamp(),
            "exp": (epoch() + Duration::minutes(10)).timestamp(),
        }))),
        authorization_code: Some(format!("code.{sub}")),
        full_name: given_name.map(|given| PersonName {
            given_name: Some(given.to_owned()),
            family_name: None,
        }),
        email: None,
        nonce: Some("n0nce".to_owned()),
        obtained_at: epoch(),
    }
}

#[must_use]
pub fn uid(value: &str) -> Uid {
    Uid::parse(value).unwrap()
}

#[must_use]
pub fn config() -> SignInConfig {
    SignInConfig {
        google: GoogleConfig {
            web_client_id: "1234-web.apps.googleusercontent.com".to_owned(),
            ios_client_id: None,
        },
        facebook: FacebookConfig {
            app_id: "987654321".to_owned(),
            client_token: None,
        },
        apple: AppleConfig {
            service_id: "com.pistachio.app".to_owned(),
        },
        identity_toolkit: IdentityToolkitConfig {
            api_key: SecretString::from("AIza-test"),
            endpoint: url::Url::parse("http://localhost:9099/").unwrap(),
        },
        database_url: None,
        telemetry: TelemetryConfig::default(),
    }
}

// =============================================================================
// Provider SDK
// =============================================================================

/// Provider SDK that replays scripted results.
#[derive(Default)]
pub struct ScriptedSdk {
    sign_ins: Mutex<VecDeque<Result<RawCredential, SdkError>>>,
    states: Mutex<VecDeque<CredentialState>>,
    refreshes: Mutex<VecDeque<Result<AppleCredential, SdkError>>>,
    sign_out_error: Mutex<Option<SdkError>>,
    gate: Option<Arc<Notify>>,
    pub configured: Mutex<Vec<Provider>>,
    pub sign_in_calls: AtomicUsize,
    pub state_queries: Mutex<Vec<String>>,
    pub sign_outs: Mutex<Vec<Provider>>,
}

impl ScriptedSdk {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `sign_in` wait on `gate` before answering.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    #[must_use]
    pub fn then_sign_in(self, result: Result<RawCredential, SdkError>) -> Self {
        lock(&self.sign_ins).push_back(result);
        self
    }

    #[must_use]
    pub fn then_state(self, state: CredentialState) -> Self {
        lock(&self.states).push_back(state);
        self
    }

    #[must_use]
    pub fn then_refresh(self, result: Result<AppleCredential, SdkError>) -> Self {
        lock(&self.refreshes).push_back(result);
        self
    }

    #[must_use]
    pub fn failing_sign_out(self, error: SdkError) -> Self {
        *lock(&self.sign_out_error) = Some(error);
        self
    }
}

#[async_trait]
impl ProviderSdk for ScriptedSdk {
    async fn configure(&self, settings: &ProviderSettings) -> Result<(), SdkError> {
        lock(&self.configured).push(settings.provider());
        Ok(())
    }

    async fn sign_in(&self, provider: Provider) -> Result<RawCredential, SdkError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        lock(&self.sign_ins).pop_front().unwrap_or_else(|| {
            Err(SdkError::NotAvailable(format!("no scripted {provider} sign-in")))
        })
    }

    async fn credential_state(&self, subject: &str) -> Result<CredentialState, SdkError> {
        lock(&self.state_queries).push(subject.to_owned());
        Ok(lock(&self.states)
            .pop_front()
            .unwrap_or(CredentialState::Authorized))
    }

    async fn refresh_apple(&self, _subject: &str) -> Result<AppleCredential, SdkError> {
        lock(&self.refreshes)
            .pop_front()
            .unwrap_or_else(|| Err(SdkError::NotAvailable("no scripted refresh".to_owned())))
    }

    async fn sign_out(&self, provider: Provider) -> Result<(), SdkError> {
        lock(&self.sign_outs).push(provider);
        lock(&self.sign_out_error).take().map_or(Ok(()), Err)
    }
}

// =============================================================================
// Backend and stores
// =============================================================================

/// Local exchange that counts calls and can be told to refuse.
#[derive(Default)]
pub struct CountingExchange {
    pub inner: LocalIdentityExchange,
    pub calls: AtomicUsize,
    refuse_with: Mutex<Option<ExchangeError>>,
}

impl CountingExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_with(&self, error: ExchangeError) {
        *lock(&self.refuse_with) = Some(error);
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityExchange for CountingExchange {
    async fn exchange(&self, assertion: &IdpAssertion) -> Result<ExchangeResult, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.refuse_with).clone() {
            return Err(error);
        }
        self.inner.exchange(assertion).await
    }
}

/// Profile store that can fail reads or writes and counts both.
#[derive(Default)]
pub struct FlakyProfileStore {
    pub inner: MemoryProfileStore,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

impl FlakyProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_profile(profile: UserProfile) -> Self {
        Self {
            inner: MemoryProfileStore::with_profile(profile),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, uid: &Uid) -> Option<UserProfile> {
        self.inner.get(uid).await.unwrap()
    }
}

#[async_trait]
impl ProfileStore for FlakyProfileStore {
    async fn get(&self, uid: &Uid) -> Result<Option<UserProfile>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read timeout".to_owned()));
        }
        self.inner.get(uid).await
    }

    async fn put(&self, uid: &Uid, profile: &UserProfile) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write timeout".to_owned()));
        }
        self.inner.put(uid, profile).await
    }
}

/// Secure store that counts operations per key.
#[derive(Default)]
pub struct CountingSecureStore {
    pub inner: MemorySecureStore,
    pub sets: Mutex<HashMap<String, usize>>,
    pub deletes: Mutex<HashMap<String, usize>>,
}

impl CountingSecureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sets(&self, key: &str) -> usize {
        lock(&self.sets).get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn deletes(&self, key: &str) -> usize {
        lock(&self.deletes).get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }
}

#[async_trait]
impl SecureLocalStore for CountingSecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        *lock(&self.sets).entry(key.to_owned()).or_default() += 1;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        *lock(&self.deletes).entry(key.to_owned()).or_default() += 1;
        self.inner.delete(key).await
    }
}

// =============================================================================
// Session, surface and clock
// =============================================================================

#[derive(Default)]
pub struct RecordingSession {
    pub signed_in: Mutex<Vec<(Provider, Uid)>>,
    pub signed_out: Mutex<Vec<Provider>>,
}

impl RecordingSession {
    #[must_use]
    pub fn signed_in(&self) -> Vec<(Provider, Uid)> {
        lock(&self.signed_in).clone()
    }

    #[must_use]
    pub fn signed_out(&self) -> Vec<Provider> {
        lock(&self.signed_out).clone()
    }
}

#[async_trait]
impl SessionContext for RecordingSession {
    async fn signed_in(&self, session: &SignInSession) {
        lock(&self.signed_in).push((session.provider, session.uid.clone()));
    }

    async fn signed_out(&self, provider: Provider) {
        lock(&self.signed_out).push(provider);
    }
}

/// Surface that records loading toggles and can be unmounted.
pub struct RecordingSurface {
    mounted: AtomicBool,
    pub loading: Mutex<Vec<(Provider, bool)>>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            mounted: AtomicBool::new(true),
            loading: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingSurface {
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn loading(&self) -> Vec<(Provider, bool)> {
        lock(&self.loading).clone()
    }
}

impl SignInSurface for RecordingSurface {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn set_loading(&self, provider: Provider, loading: bool) {
        lock(&self.loading).push((provider, loading));
    }
}

/// Clock that advances one minute on every read, starting at [`epoch`].
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            next: Mutex::new(epoch()),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = lock(&self.next);
        let now = *next;
        *next = now + Duration::minutes(1);
        now
    }
}

// =============================================================================
// Harness
// =============================================================================

/// One orchestrator wired to inspectable collaborators.
pub struct Harness {
    pub orchestrator: SignInOrchestrator<ScriptedSdk>,
    pub exchange: Arc<CountingExchange>,
    pub profiles: Arc<FlakyProfileStore>,
    pub secure_store: Arc<CountingSecureStore>,
    pub session: Arc<RecordingSession>,
    pub surface: Arc<RecordingSurface>,
}

impl Harness {
    pub async fn new(sdk: ScriptedSdk) -> Self {
        Self::with_profiles(sdk, FlakyProfileStore::new()).await
    }

    pub async fn with_profiles(sdk: ScriptedSdk, profiles: FlakyProfileStore) -> Self {
        let exchange = Arc::new(CountingExchange::new());
        let profiles = Arc::new(profiles);
        let secure_store = Arc::new(CountingSecureStore::new());
        let session = Arc::new(RecordingSession::default());
        let surface = Arc::new(RecordingSurface::default());

        let sdk = configure_providers(sdk, &config()).await.unwrap();
        let orchestrator = SignInOrchestrator::new(
            sdk,
            Collaborators {
                exchange: Arc::clone(&exchange) as Arc<dyn IdentityExchange>,
                profiles: Arc::clone(&profiles) as Arc<dyn ProfileStore>,
                secure_store: Arc::clone(&secure_store) as Arc<dyn SecureLocalStore>,
                session: Arc::clone(&session) as Arc<dyn SessionContext>,
                surface: Arc::clone(&surface) as Arc<dyn SignInSurface>,
            },
        )
        .with_clock(Arc::new(SteppingClock::default()));

        Self {
            orchestrator,
            exchange,
            profiles,
            secure_store,
            session,
            surface,
        }
    }

    /// Route the next exchange for `(provider, subject)` to `uid`.
    pub fn link(&self, provider: Provider, subject: &str, uid: &Uid) {
        self.exchange.inner.link(provider, subject, uid.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
