//! Result of a completed sign-in.

use std::fmt;

use secrecy::SecretString;

use social_signin_core::{IdentityClaim, Provider, Uid, UserProfile};

/// Secure local storage keys.
pub mod secure_keys {
    /// Last Apple credential, JSON-encoded `StoredAppleCredential`.
    pub const APPLE_CREDENTIAL: &str = "apple.credential";
}

/// An authenticated session handed to the application.
pub struct SignInSession {
    pub provider: Provider,
    pub uid: Uid,
    /// Backend-issued federated identity token.
    pub token: SecretString,
    /// Reconciled profile, whether or not it reached the store.
    pub profile: UserProfile,
    pub claim: IdentityClaim,
    /// `false` when the profile write was skipped or failed.
    pub persisted: bool,
}

impl fmt::Debug for SignInSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInSession")
            .field("provider", &self.provider)
            .field("uid", &self.uid)
            .field("token", &"[REDACTED]")
            .field("profile", &self.profile)
            .field("claim", &self.claim)
            .field("persisted", &self.persisted)
            .finish()
    }
}

/// Terminal outcome of a sign-in attempt that did not fail.
#[derive(Debug)]
pub enum SignInOutcome {
    SignedIn(Box<SignInSession>),
    /// The user dismissed the provider prompt.
    Cancelled,
}

impl SignInOutcome {
    /// The session, if the user completed sign-in.
    #[must_use]
    pub fn session(&self) -> Option<&SignInSession> {
        match self {
            Self::SignedIn(session) => Some(session),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn into_session(self) -> Option<SignInSession> {
        match self {
            Self::SignedIn(session) => Some(*session),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
