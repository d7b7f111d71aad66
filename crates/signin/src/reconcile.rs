//! Profile reconciliation.
//!
//! Merges a freshly normalized [`IdentityClaim`] into the stored
//! [`UserProfile`] (if any). The merge policy is the [`MERGE_TABLE`]: one
//! strategy per profile field, applied uniformly for every provider.
//!
//! Reconciliation is pure. It performs no I/O and reads the clock at most
//! once per call.

use chrono::{DateTime, Utc};
use thiserror::Error;

use social_signin_core::{IdentityClaim, Provider, ProviderIds, Uid, UserProfile};

/// Reconciliation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The claim's provider user id is empty.
    #[error("claim for {provider} has an empty provider user id")]
    InvalidClaim { provider: Provider },
}

/// Mergeable profile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Email,
    ProfilePhotoUrl,
    EmailVerified,
    LastSignInTime,
    Provider,
    ProviderIds,
    CreatedAt,
}

/// How a field combines the stored value with the claim's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Take the claim's value when it is non-empty, otherwise keep the
    /// stored one.
    FillOrOverwrite,
    /// Always take the claim's value.
    Latest,
    /// Add the claim's entries, leaving other stored entries untouched.
    Union,
    /// Keep the stored value.
    Preserve,
}

/// Per-field merge policy.
pub const MERGE_TABLE: [(ProfileField, MergeStrategy); 8] = [
    (ProfileField::Name, MergeStrategy::FillOrOverwrite),
    (ProfileField::Email, MergeStrategy::FillOrOverwrite),
    (ProfileField::ProfilePhotoUrl, MergeStrategy::FillOrOverwrite),
    (ProfileField::EmailVerified, MergeStrategy::Latest),
    (ProfileField::LastSignInTime, MergeStrategy::Latest),
    (ProfileField::Provider, MergeStrategy::Latest),
    (ProfileField::ProviderIds, MergeStrategy::Union),
    (ProfileField::CreatedAt, MergeStrategy::Preserve),
];

/// Reconcile `claim` with `existing`, reading the clock once.
///
/// # Errors
///
/// Returns `ReconcileError::InvalidClaim` if the claim's provider user id is
/// empty.
pub fn reconcile(
    uid: &Uid,
    claim: &IdentityClaim,
    existing: Option<&UserProfile>,
) -> Result<UserProfile, ReconcileError> {
    reconcile_at(uid, claim, existing, Utc::now())
}

/// Reconcile `claim` with `existing` at the instant `now`.
///
/// Deterministic: identical inputs produce identical profiles.
///
/// # Errors
///
/// Returns `ReconcileError::InvalidClaim` if the claim's provider user id is
/// empty.
pub fn reconcile_at(
    uid: &Uid,
    claim: &IdentityClaim,
    existing: Option<&UserProfile>,
    now: DateTime<Utc>,
) -> Result<UserProfile, ReconcileError> {
    if claim.provider_user_id.is_blank() {
        return Err(ReconcileError::InvalidClaim {
            provider: claim.provider,
        });
    }

    let incoming = profile_from_claim(uid, claim, now);
    let Some(existing) = existing else {
        return Ok(incoming);
    };

    let mut merged = existing.clone();
    merged.uid = incoming.uid;
    for (field, strategy) in MERGE_TABLE {
        match field {
            ProfileField::Name => {
                merged.name = apply(strategy, merged.name, incoming.name.clone());
            }
            ProfileField::Email => {
                merged.email = apply(strategy, merged.email, incoming.email.clone());
            }
            ProfileField::ProfilePhotoUrl => {
                merged.profile_photo_url = apply(
                    strategy,
                    merged.profile_photo_url,
                    incoming.profile_photo_url.clone(),
                );
            }
            ProfileField::EmailVerified => {
                merged.email_verified =
                    apply(strategy, merged.email_verified, incoming.email_verified);
            }
            ProfileField::LastSignInTime => {
                merged.last_sign_in_time =
                    apply(strategy, merged.last_sign_in_time, incoming.last_sign_in_time);
            }
            ProfileField::Provider => {
                merged.provider = apply(strategy, merged.provider, incoming.provider);
            }
            ProfileField::ProviderIds => {
                merged.provider_ids =
                    apply(strategy, merged.provider_ids, incoming.provider_ids.clone());
            }
            ProfileField::CreatedAt => {
                merged.created_at = apply(strategy, merged.created_at, incoming.created_at);
            }
        }
    }

    Ok(merged)
}

/// The profile a claim describes on its own: a first sign-in.
fn profile_from_claim(uid: &Uid, claim: &IdentityClaim, now: DateTime<Utc>) -> UserProfile {
    let mut provider_ids = ProviderIds::new();
    provider_ids.insert(claim.provider, claim.provider_user_id.clone());

    UserProfile {
        uid: uid.clone(),
        email: claim.email.clone(),
        name: present_text(claim.display_name.as_deref()),
        profile_photo_url: present_text(claim.profile_photo_url.as_deref()),
        email_verified: claim.email_verified,
        provider: claim.provider,
        provider_ids,
        created_at: now,
        last_sign_in_time: now,
    }
}

fn present_text(value: Option<&str>) -> Option<String> {
    social_signin_core::claim::non_blank(value).map(str::to_owned)
}

/// A profile field value that can be merged.
trait Mergeable: Sized {
    /// Whether the value carries information. Empty values never replace
    /// stored ones under [`MergeStrategy::FillOrOverwrite`].
    fn is_present(&self) -> bool {
        true
    }

    fn union(self, incoming: Self) -> Self {
        incoming
    }
}

impl<T> Mergeable for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }

    fn union(self, incoming: Self) -> Self {
        incoming.or(self)
    }
}

impl Mergeable for bool {}
impl Mergeable for DateTime<Utc> {}
impl Mergeable for Provider {}

impl Mergeable for ProviderIds {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }

    fn union(mut self, incoming: Self) -> Self {
        self.extend(incoming);
        self
    }
}

fn apply<T: Mergeable>(strategy: MergeStrategy, existing: T, incoming: T) -> T {
    match strategy {
        MergeStrategy::FillOrOverwrite => {
            if incoming.is_present() {
                incoming
            } else {
                existing
            }
        }
        MergeStrategy::Latest => incoming,
        MergeStrategy::Union => existing.union(incoming),
        MergeStrategy::Preserve => existing,
    }
}
