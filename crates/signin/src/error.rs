//! Caller-visible sign-in errors.
//!
//! The orchestrator is the only layer that interprets collaborator errors.
//! It folds them into [`SignInError`], which tells the UI whether to offer a
//! retry and what to say. A cancelled sign-in is not an error and a failed
//! profile write is never surfaced.

use thiserror::Error;

use social_signin_core::Provider;

use crate::freshness::FreshnessError;
use crate::normalize::NormalizeError;
use crate::reconcile::ReconcileError;
use crate::services::{ExchangeError, SdkError};

/// Sign-in failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignInError {
    /// The provider credential is unusable. Permanent.
    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizeError),

    /// Network or availability failure. Safe to retry.
    #[error("{provider} unavailable: {source}")]
    TransientProvider {
        provider: Provider,
        #[source]
        source: SdkError,
    },

    /// The backend refused the credential.
    #[error("{provider} exchange failed: {source}")]
    BackendExchange {
        provider: Provider,
        #[source]
        source: ExchangeError,
    },

    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// A sign-in for this provider is already running.
    #[error("{0} sign-in already in progress")]
    AlreadyInFlight(Provider),

    /// Apple credential check or refresh failed.
    #[error("apple credential: {0}")]
    Freshness(#[from] FreshnessError),
}

impl SignInError {
    /// Fold an SDK error. `UserCancelled` never reaches here.
    pub(crate) const fn from_sdk(provider: Provider, source: SdkError) -> Self {
        Self::TransientProvider { provider, source }
    }

    pub(crate) const fn from_exchange(provider: Provider, source: ExchangeError) -> Self {
        Self::BackendExchange { provider, source }
    }

    /// Whether the UI should offer a retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::TransientProvider { source, .. } => {
                matches!(source, SdkError::Network(_) | SdkError::NotAvailable(_))
            }
            Self::BackendExchange { source, .. } => matches!(source, ExchangeError::Transport(_)),
            Self::Freshness(FreshnessError::Sdk(SdkError::Network(_))) => true,
            Self::Normalization(_)
            | Self::Reconcile(_)
            | Self::AlreadyInFlight(_)
            | Self::Freshness(_) => false,
        }
    }

    /// Short message for the sign-in screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Normalization(_) | Self::Reconcile(_) => {
                "Sign-in failed. Please try a different sign-in method.".to_string()
            }
            Self::TransientProvider { provider, .. } => {
                format!("Couldn't reach {}. Check your connection and try again.", display(*provider))
            }
            Self::BackendExchange { source, .. } => match source {
                ExchangeError::AccountConflict { .. } => {
                    "An account already exists with the same email address.".to_string()
                }
                ExchangeError::AccountDisabled => "This account has been disabled.".to_string(),
                ExchangeError::OperationNotAllowed => {
                    "This sign-in method is not enabled.".to_string()
                }
                ExchangeError::InvalidCredential(_) => {
                    "Sign-in failed. Please try a different sign-in method.".to_string()
                }
                ExchangeError::Transport(_) | ExchangeError::Unexpected(_) => {
                    "Sign-in is temporarily unavailable. Please try again.".to_string()
                }
            },
            Self::AlreadyInFlight(_) => "Sign-in is already in progress.".to_string(),
            Self::Freshness(_) => "Please sign in with Apple again.".to_string(),
        }
    }

    /// Provider-specific next step for permanent backend failures.
    #[must_use]
    pub fn remediation_hint(&self) -> Option<String> {
        let Self::BackendExchange { provider, source } = self else {
            return None;
        };
        let provider = display(*provider);
        match source {
            ExchangeError::AccountConflict { email: Some(email) } => Some(format!(
                "Sign in with the method you originally used for {email}, then link {provider} from your account settings."
            )),
            ExchangeError::AccountConflict { email: None } => Some(format!(
                "Sign in with the method you originally used, then link {provider} from your account settings."
            )),
            ExchangeError::AccountDisabled => {
                Some("Contact support to re-enable your account.".to_string())
            }
            ExchangeError::OperationNotAllowed => Some(format!(
                "{provider} sign-in is turned off for this app. Use another sign-in method."
            )),
            ExchangeError::InvalidCredential(_) => Some(format!(
                "Sign out of {provider} on this device and try again."
            )),
            ExchangeError::Transport(_) | ExchangeError::Unexpected(_) => None,
        }
    }
}

const fn display(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "Google",
        Provider::Facebook => "Facebook",
        Provider::Apple => "Apple",
    }
}
