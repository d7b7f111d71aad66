//! Provider-reported credential state.
//!
//! Only Apple exposes a state query for a previously issued credential; the
//! other providers rely on SDK-reported token validity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Validity of a stored credential as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialState {
    Authorized,
    Revoked,
    NotFound,
    Transferred,
    /// Anything the provider reports that this layer does not recognise.
    #[serde(other)]
    Unknown,
}

impl CredentialState {
    /// Whether the credential may still be used.
    ///
    /// Every state other than `AUTHORIZED`, including `UNKNOWN`, means the
    /// local copy must be invalidated.
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// The provider's wire token for this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorized => "AUTHORIZED",
            Self::Revoked => "REVOKED",
            Self::NotFound => "NOT_FOUND",
            Self::Transferred => "TRANSFERRED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Interpret a raw state token. Unrecognised tokens map to `Unknown`.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "AUTHORIZED" => Self::Authorized,
            "REVOKED" => Self::Revoked,
            "NOT_FOUND" => Self::NotFound,
            "TRANSFERRED" => Self::Transferred,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
