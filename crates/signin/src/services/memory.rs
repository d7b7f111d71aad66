//! In-process collaborators for tests and local development.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use social_signin_core::{Provider, Uid, UserProfile};

use super::{
    ExchangeError, ExchangeResult, IdentityExchange, ProfileStore, SecureLocalStore, StoreError,
};
use crate::models::{FederatedIdentity, IdpAssertion, IdpToken};
use crate::normalize::id_token::{JsonBool, decode_payload};

/// Profiles held in memory.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<Uid, UserProfile>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `profile`.
    #[must_use]
    pub fn with_profile(profile: UserProfile) -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(profile.uid.clone(), profile);
        Self {
            profiles: RwLock::new(profiles),
        }
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, uid: &Uid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.read().await.get(uid).cloned())
    }

    async fn put(&self, uid: &Uid, profile: &UserProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(uid.clone(), profile.clone());
        Ok(())
    }
}

/// Secure local storage held in memory.
#[derive(Debug, Default)]
pub struct MemorySecureStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[async_trait]
impl SecureLocalStore for MemorySecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Subset of OIDC claims read from an unverified ID token.
#[derive(Debug, Deserialize)]
struct OidcClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<JsonBool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Identity exchange that trusts the assertion and issues local uids.
///
/// Each `(provider, subject)` pair gets a stable uuid-v4 uid. ID tokens are
/// decoded without verification; access tokens are used as the subject.
#[derive(Debug, Default)]
pub struct LocalIdentityExchange {
    links: Mutex<HashMap<(Provider, String), Uid>>,
}

impl LocalIdentityExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-link a provider subject to an existing uid.
    pub fn link(&self, provider: Provider, subject: &str, uid: Uid) {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((provider, subject.to_owned()), uid);
    }

    fn uid_for(&self, provider: Provider, subject: &str) -> Result<Uid, ExchangeError> {
        let key = (provider, subject.to_owned());
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(uid) = links.get(&key) {
            return Ok(uid.clone());
        }
        let uid = Uid::parse(&Uuid::new_v4().to_string())
            .map_err(|e| ExchangeError::Unexpected(e.to_string()))?;
        links.insert(key, uid.clone());
        Ok(uid)
    }
}

#[async_trait]
impl IdentityExchange for LocalIdentityExchange {
    async fn exchange(&self, assertion: &IdpAssertion) -> Result<ExchangeResult, ExchangeError> {
        let (subject, federated) = match &assertion.token {
            IdpToken::IdToken(token) => {
                let claims: OidcClaims = decode_payload(token.expose_secret())
                    .map_err(|e| ExchangeError::InvalidCredential(e.to_string()))?;
                let subject = claims
                    .sub
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| ExchangeError::InvalidCredential("token has no sub".to_owned()))?;
                let federated = FederatedIdentity {
                    provider_user_id: Some(subject.clone()),
                    email: claims.email,
                    email_verified: claims.email_verified.map(JsonBool::value),
                    display_name: claims.name,
                    photo_url: claims.picture,
                };
                (subject, federated)
            }
            IdpToken::AccessToken(token) => {
                (token.expose_secret().to_owned(), FederatedIdentity::default())
            }
        };

        Ok(ExchangeResult {
            token: SecretString::from(format!("local.{}", Uuid::new_v4().simple())),
            uid: self.uid_for(assertion.provider, &subject)?,
            federated,
        })
    }
}
