//! Canonical user profile record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, Provider, ProviderUserId, Uid};

/// Provider -> provider user id, accumulated across sign-ins.
///
/// A `BTreeMap` keeps serialization order stable so identical profiles
/// produce identical documents.
pub type ProviderIds = BTreeMap<Provider, ProviderUserId>;

/// The durable, merged user record.
///
/// Keyed by the backend-issued [`Uid`], never by a provider id. The profile
/// store owns it; the reconciler only computes the next value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: Uid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// Provider used for the most recent sign-in.
    pub provider: Provider,
    #[serde(default)]
    pub provider_ids: ProviderIds,
    /// Set once when the profile is first created.
    pub created_at: DateTime<Utc>,
    pub last_sign_in_time: DateTime<Utc>,
}

impl UserProfile {
    /// Whether the given provider has ever been used for this profile.
    #[must_use]
    pub fn is_linked(&self, provider: Provider) -> bool {
        self.provider_ids.contains_key(&provider)
    }

    /// The provider-scoped user id recorded for `provider`.
    #[must_use]
    pub fn provider_user_id(&self, provider: Provider) -> Option<&ProviderUserId> {
        self.provider_ids.get(&provider)
    }

    /// Providers linked to this profile, in stable order.
    pub fn linked_providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.provider_ids.keys().copied()
    }
}
