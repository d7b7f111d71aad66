//! External collaborators of the sign-in pipeline.
//!
//! The pipeline only talks to the outside world through these traits:
//! provider SDKs, the backend identity exchange, the profile store, secure
//! local storage, the application session and the UI surface.
//!
//! Implementations shipped here:
//! - [`identity_toolkit::IdentityToolkitClient`] - backend exchange over HTTP
//! - [`memory`] - in-process stores and exchange for tests and local runs
//! - `crate::db::profiles::PgProfileStore` - Postgres profile store

pub mod identity_toolkit;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;

use social_signin_core::{CredentialState, Provider, Uid, UserProfile};

use crate::models::{AppleCredential, FederatedIdentity, IdpAssertion, RawCredential, SignInSession};
use crate::sdk::ProviderSettings;

/// Errors reported by a provider SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    /// The user dismissed the provider prompt.
    #[error("sign-in cancelled by user")]
    UserCancelled,

    /// The provider is not available on this device or not configured.
    #[error("provider not available: {0}")]
    NotAvailable(String),

    /// Network failure talking to the provider.
    #[error("network error: {0}")]
    Network(String),

    /// Any other provider-reported failure.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Errors reported by the backend identity exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The provider identity or its email is already linked to another account.
    #[error("account exists with different credential")]
    AccountConflict { email: Option<String> },

    #[error("account disabled")]
    AccountDisabled,

    /// The provider is not enabled on the backend.
    #[error("sign-in provider not enabled")]
    OperationNotAllowed,

    /// The backend rejected the provider token.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Transport failure or backend unavailable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response the client does not understand.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Errors from profile or secure local storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Successful backend exchange.
#[derive(Debug)]
pub struct ExchangeResult {
    /// Backend-issued federated identity token.
    pub token: SecretString,
    pub uid: Uid,
    pub federated: FederatedIdentity,
}

/// A provider SDK (Google Sign-In, Facebook Login, Sign in with Apple).
#[async_trait]
pub trait ProviderSdk: Send + Sync {
    /// One-time process-wide SDK configuration.
    async fn configure(&self, settings: &ProviderSettings) -> Result<(), SdkError>;

    /// Run the provider's interactive sign-in.
    async fn sign_in(&self, provider: Provider) -> Result<RawCredential, SdkError>;

    /// Apple credential state for a stored user subject.
    async fn credential_state(&self, subject: &str) -> Result<CredentialState, SdkError>;

    /// Ask Apple for a fresh credential for a stored user subject.
    async fn refresh_apple(&self, subject: &str) -> Result<AppleCredential, SdkError>;

    async fn sign_out(&self, provider: Provider) -> Result<(), SdkError>;
}

/// Backend verification of a provider token.
#[async_trait]
pub trait IdentityExchange: Send + Sync {
    async fn exchange(&self, assertion: &IdpAssertion) -> Result<ExchangeResult, ExchangeError>;
}

/// Durable profile storage keyed by uid.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, uid: &Uid) -> Result<Option<UserProfile>, StoreError>;

    async fn put(&self, uid: &Uid, profile: &UserProfile) -> Result<(), StoreError>;
}

/// Device-local encrypted key/value storage.
#[async_trait]
pub trait SecureLocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// The application's auth/session context.
#[async_trait]
pub trait SessionContext: Send + Sync {
    async fn signed_in(&self, session: &SignInSession);

    async fn signed_out(&self, provider: Provider);
}

/// UI-bound state of the sign-in screen.
pub trait SignInSurface: Send + Sync {
    /// `false` once the hosting UI has gone away.
    fn is_mounted(&self) -> bool;

    fn set_loading(&self, provider: Provider, loading: bool);
}

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
