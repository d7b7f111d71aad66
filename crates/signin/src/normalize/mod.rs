//! Provider credential normalization.
//!
//! Turns a provider-specific [`RawCredential`] into a canonical
//! [`IdentityClaim`]. Every function here is pure: the raw credential and the
//! backend's [`FederatedIdentity`] have already been fetched.
//!
//! Google and Apple are handled asymmetrically. The Google ID token is never
//! decoded here; its claim fields come from the backend exchange. The Apple
//! identity token is decoded locally for subject, email and expiry.

mod apple;
mod facebook;
mod google;
pub mod id_token;

use thiserror::Error;

use social_signin_core::{IdentityClaim, Provider};

use crate::models::{FederatedIdentity, RawCredential};

/// Permanent normalization failure. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The credential lacks the token its provider requires.
    #[error("{0} credential has no identity token")]
    MissingIdentityToken(Provider),

    /// The provider-scoped user id is absent or blank.
    #[error("{0} credential has no provider user id")]
    MissingProviderUserId(Provider),

    /// The identity token could not be decoded.
    #[error("malformed identity token: {0}")]
    MalformedToken(String),
}

/// Normalize a raw credential into an identity claim.
///
/// # Errors
///
/// Returns `NormalizeError::MissingIdentityToken` if an Apple credential has
/// no identity token, `NormalizeError::MalformedToken` if that token cannot be
/// decoded, and `NormalizeError::MissingProviderUserId` if no non-empty
/// provider user id can be resolved.
pub fn normalize(
    raw: &RawCredential,
    federated: &FederatedIdentity,
) -> Result<IdentityClaim, NormalizeError> {
    match raw {
        RawCredential::Google(credential) => google::normalize(credential, federated),
        RawCredential::Facebook(credential) => facebook::normalize(credential, federated),
        RawCredential::Apple(credential) => apple::normalize(credential, federated),
    }
}
