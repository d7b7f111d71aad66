//! Provider credential shapes.
//!
//! Each provider SDK hands back a differently shaped credential. They are
//! modelled as a tagged union so the normalizer dispatches on the variant
//! instead of probing for fields.
//!
//! Token-bearing types implement `Debug` manually to redact tokens.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use social_signin_core::{PersonName, Provider, claim::non_blank};

use crate::normalize::NormalizeError;

/// A raw credential returned by a provider SDK sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum RawCredential {
    Google(GoogleCredential),
    Facebook(FacebookCredential),
    Apple(AppleCredential),
}

impl RawCredential {
    /// The provider that issued this credential.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::Google(_) => Provider::Google,
            Self::Facebook(_) => Provider::Facebook,
            Self::Apple(_) => Provider::Apple,
        }
    }

    /// When the SDK produced the credential.
    #[must_use]
    pub const fn obtained_at(&self) -> DateTime<Utc> {
        match self {
            Self::Google(c) => c.obtained_at,
            Self::Facebook(c) => c.obtained_at,
            Self::Apple(c) => c.obtained_at,
        }
    }
}

/// Google Sign-In result.
///
/// The ID token is opaque to this layer; user fields are only hints; the
/// backend exchange resolves the authoritative values.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCredential {
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Google account id as reported by the SDK.
    #[serde(default)]
    pub user_id: Option<String>,
    pub obtained_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for GoogleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleCredential")
            .field("id_token", &redacted(self.id_token.as_ref()))
            .field("access_token", &redacted(self.access_token.as_ref()))
            .field("user_id", &self.user_id)
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Facebook Login result: an access token plus the Graph API profile
/// fetched with `id,name,email,picture.type(large),first_name,last_name`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacebookCredential {
    #[serde(default)]
    pub access_token: Option<String>,
    pub obtained_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub profile: GraphProfile,
}

impl fmt::Debug for FacebookCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacebookCredential")
            .field("access_token", &redacted(self.access_token.as_ref()))
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .field("profile", &self.profile)
            .finish()
    }
}

/// Graph API `/me` response. Field names follow the Graph API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub picture: Option<GraphPicture>,
}

impl GraphProfile {
    /// `picture.data.url`, if Graph returned one.
    #[must_use]
    pub fn picture_url(&self) -> Option<&str> {
        let url = self.picture.as_ref()?.data.as_ref()?.url.as_deref();
        non_blank(url)
    }
}

/// Graph API picture wrapper (`picture.data`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPicture {
    #[serde(default)]
    pub data: Option<GraphPictureData>,
}

/// Graph API picture payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPictureData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_silhouette: Option<bool>,
}

/// Sign in with Apple result.
///
/// `full_name` and `email` are only present on the very first
/// authorization of the app by this Apple ID.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleCredential {
    /// Apple's stable user identifier (same as the token `sub`).
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub identity_token: Option<String>,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub full_name: Option<PersonName>,
    #[serde(default)]
    pub email: Option<String>,
    /// Raw nonce whose hash was sent with the authorization request.
    #[serde(default)]
    pub nonce: Option<String>,
    pub obtained_at: DateTime<Utc>,
}

impl fmt::Debug for AppleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppleCredential")
            .field("user", &self.user)
            .field("identity_token", &redacted(self.identity_token.as_ref()))
            .field(
                "authorization_code",
                &redacted(self.authorization_code.as_ref()),
            )
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("nonce", &redacted(self.nonce.as_ref()))
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Provider token handed to the backend exchange.
#[derive(Debug)]
pub enum IdpToken {
    IdToken(SecretString),
    AccessToken(SecretString),
}

/// What the backend needs to verify a provider sign-in.
///
/// Derived without I/O from a [`RawCredential`]. A credential that cannot
/// produce one is a permanent normalization failure, so the exchange is
/// never attempted with it.
#[derive(Debug)]
pub struct IdpAssertion {
    pub provider: Provider,
    pub token: IdpToken,
    pub nonce: Option<String>,
}

impl IdpAssertion {
    /// Extract the exchangeable token from a raw credential.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError::MissingIdentityToken` if the credential lacks
    /// the token its provider requires (Google and Apple: identity token,
    /// Facebook: access token).
    pub fn from_credential(raw: &RawCredential) -> Result<Self, NormalizeError> {
        let provider = raw.provider();
        let missing = || NormalizeError::MissingIdentityToken(provider);

        let (token, nonce) = match raw {
            RawCredential::Google(c) => {
                let id_token = non_blank(c.id_token.as_deref()).ok_or_else(missing)?;
                (IdpToken::IdToken(SecretString::from(id_token.to_owned())), None)
            }
            RawCredential::Facebook(c) => {
                let access_token = non_blank(c.access_token.as_deref()).ok_or_else(missing)?;
                (
                    IdpToken::AccessToken(SecretString::from(access_token.to_owned())),
                    None,
                )
            }
            RawCredential::Apple(c) => {
                let id_token = non_blank(c.identity_token.as_deref()).ok_or_else(missing)?;
                (
                    IdpToken::IdToken(SecretString::from(id_token.to_owned())),
                    non_blank(c.nonce.as_deref()).map(str::to_owned),
                )
            }
        };

        Ok(Self {
            provider,
            token,
            nonce,
        })
    }
}

/// User fields the backend resolved while verifying the provider token.
///
/// For Google these are the authoritative claim values. For Facebook and
/// Apple they only fill `email_verified` when the provider payload is silent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedIdentity {
    #[serde(default)]
    pub provider_user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// The last Apple credential, cached in secure local storage.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAppleCredential {
    /// Apple user identifier used for credential-state queries.
    pub user: String,
    pub identity_token: String,
    #[serde(default)]
    pub authorization_code: Option<String>,
    pub stored_at: DateTime<Utc>,
}

impl fmt::Debug for StoredAppleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredAppleCredential")
            .field("user", &self.user)
            .field("identity_token", &"[REDACTED]")
            .field(
                "authorization_code",
                &redacted(self.authorization_code.as_ref()),
            )
            .field("stored_at", &self.stored_at)
            .finish()
    }
}

fn redacted(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[REDACTED]")
}
