//! Social Sign-In - credential normalization, profile reconciliation and
//! sign-in orchestration for Google, Facebook and Apple.
//!
//! # Pipeline
//!
//! ```text
//! ProviderSdk::sign_in -> RawCredential
//!   -> IdpAssertion -> IdentityExchange::exchange -> {token, uid}
//!   -> normalize -> IdentityClaim
//!   -> ProfileStore::get -> reconcile -> ProfileStore::put
//!   -> SessionContext::signed_in
//! ```
//!
//! # Modules
//!
//! - [`normalize`] - raw provider credential to [`social_signin_core::IdentityClaim`]
//! - [`reconcile`] - declarative claim/profile merge
//! - [`freshness`] - Apple credential state tracking
//! - [`orchestrator`] - the sign-in pipeline
//! - [`services`] - collaborator traits and their shipped implementations
//! - [`db`] - `PostgreSQL` profile store
//! - [`sdk`] - one-time provider SDK configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod freshness;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod reconcile;
pub mod sdk;
pub mod services;
pub mod telemetry;

pub use config::{ConfigError, SignInConfig};
pub use error::SignInError;
pub use freshness::{AppleCredentialTracker, FreshnessCheck, FreshnessError, FreshnessState};
pub use normalize::{NormalizeError, normalize};
pub use orchestrator::{Collaborators, SignInOrchestrator};
pub use reconcile::{ReconcileError, reconcile, reconcile_at};
pub use sdk::{ConfiguredSdk, ProviderSettings, configure_providers};
