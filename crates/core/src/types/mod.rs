//! Core types for social sign-in.
//!
//! This module provides type-safe wrappers for identity concepts shared by
//! every provider.

pub mod claim;
pub mod credential;
pub mod email;
pub mod id;
pub mod profile;
pub mod provider;

pub use claim::{ExpiryInfo, IdentityClaim, PersonName};
pub use credential::CredentialState;
pub use email::{Email, EmailError};
pub use id::*;
pub use profile::{ProviderIds, UserProfile};
pub use provider::{Provider, ProviderParseError};
