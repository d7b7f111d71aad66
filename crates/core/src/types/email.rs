//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Domain Apple uses for "Hide My Email" relay addresses.
const APPLE_PRIVATE_RELAY_DOMAIN: &str = "privaterelay.appleid.com";

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain exactly one @ symbol.
    #[error("email must contain exactly one @ symbol")]
    MissingAtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) is empty.
    #[error("email domain cannot be empty")]
    EmptyDomain,
}

/// An email address reported by an identity provider.
///
/// Providers hand out emails in varying states of completeness: Apple only
/// includes one on the first authorization (and may substitute a relay
/// address), Facebook omits it when the user declined the permission. This
/// type only guarantees a plausible shape. Whether the provider vouched for
/// the address is tracked separately as `email_verified`.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Exactly one @ symbol with non-empty local part and domain
///
/// ## Examples
///
/// ```
/// use social_signin_core::Email;
///
/// assert!(Email::parse("user@example.com").is_ok());
/// assert!(Email::parse("no-at-symbol").is_err());
///
/// // Provider values are trimmed and blank ones become `None`
/// assert_eq!(Email::from_provider(Some("  ")), None);
/// assert!(Email::from_provider(Some(" jo@x.com ")).is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 254 characters,
    /// does not contain exactly one @ symbol, or has an empty local part or
    /// domain.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        if s.is_empty() {
            return Err(EmailError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::MissingAtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::MissingAtSymbol);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.is_empty() {
            return Err(EmailError::EmptyDomain);
        }

        Ok(Self(s.to_owned()))
    }

    /// Interpret an optional, possibly blank value handed over by a provider.
    ///
    /// Surrounding whitespace is dropped. Blank or malformed values yield
    /// `None` so that they never overwrite a stored address.
    #[must_use]
    pub fn from_provider(value: Option<&str>) -> Option<Self> {
        let trimmed = value.map(str::trim).filter(|v| !v.is_empty())?;
        Self::parse(trimmed).ok()
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Email` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the local part of the email (before the @).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    /// Whether this is an Apple "Hide My Email" relay address.
    #[must_use]
    pub fn is_private_relay(&self) -> bool {
        self.domain().eq_ignore_ascii_case(APPLE_PRIVATE_RELAY_DOMAIN)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
