//! Normalized identity claim produced by a single sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, Provider, ProviderUserId};

/// Structured name as delivered by Apple on the first-ever authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

impl PersonName {
    /// Trimmed, non-empty given name.
    #[must_use]
    pub fn given(&self) -> Option<&str> {
        non_blank(self.given_name.as_deref())
    }

    /// Trimmed, non-empty family name.
    #[must_use]
    pub fn family(&self) -> Option<&str> {
        non_blank(self.family_name.as_deref())
    }

    /// `"given family"`, falling back to whichever half is present.
    ///
    /// Returns `None` when neither half has visible characters.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        match (self.given(), self.family()) {
            (Some(given), Some(family)) => Some(format!("{given} {family}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_owned()),
            (None, None) => None,
        }
    }
}

/// Provider-specific expiry information carried by a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpiryInfo {
    /// Expiry decoded from a locally inspected identity token (Apple `exp`).
    IdentityToken { expires_at: DateTime<Utc> },
    /// Validity reported by the provider SDK for its access token.
    SdkReported {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
}

impl ExpiryInfo {
    /// The instant the credential stops being valid, when known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::IdentityToken { expires_at } => Some(*expires_at),
            Self::SdkReported { expires_at } => *expires_at,
        }
    }

    /// Whether the credential is past its expiry at `now`.
    ///
    /// Unknown expiry is treated as valid: the SDK owns that decision.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }
}

/// Normalized output of a single sign-in event.
///
/// Claims are transient: the sign-in pipeline owns one for the duration of a
/// single call and hands it to the reconciler. Optional fields are `None`
/// when the provider did not supply a non-empty value; they are never
/// invented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaim {
    pub provider: Provider,
    pub provider_user_id: ProviderUserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Apple only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Apple only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo_url: Option<String>,
    pub raw_expiry_info: ExpiryInfo,
    pub issued_at: DateTime<Utc>,
}

/// Trim a provider-supplied string, treating blank as absent.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
