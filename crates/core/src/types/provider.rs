//! Identity provider enumeration.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a supported provider.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported identity provider: {0}")]
pub struct ProviderParseError(pub String);

/// An external identity vendor.
///
/// The declaration order is also the sort order used for
/// [`ProviderIds`](crate::ProviderIds), so serialized profiles list linked
/// providers deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
    Apple,
}

impl Provider {
    /// Every supported provider, in declaration order.
    pub const ALL: [Self; 3] = [Self::Google, Self::Facebook, Self::Apple];

    /// Short lowercase name (`google`, `facebook`, `apple`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
        }
    }

    /// Provider id understood by the backend auth service (`google.com`, ...).
    #[must_use]
    pub const fn federated_id(self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Facebook => "facebook.com",
            Self::Apple => "apple.com",
        }
    }

    /// Parse a backend provider id such as `apple.com`.
    #[must_use]
    pub fn from_federated_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.federated_id() == id)
    }

    /// Whether this layer decodes the provider's identity token itself.
    ///
    /// Only Apple's token is decoded locally. Google's token stays opaque
    /// until the backend exchange resolves it, and Facebook hands out an
    /// access token plus a Graph profile instead.
    #[must_use]
    pub const fn decodes_identity_token_locally(self) -> bool {
        matches!(self, Self::Apple)
    }

    /// Whether the provider exposes a credential-state query.
    #[must_use]
    pub const fn reports_credential_state(self) -> bool {
        matches!(self, Self::Apple)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "google.com" => Ok(Self::Google),
            "facebook" | "facebook.com" => Ok(Self::Facebook),
            "apple" | "apple.com" => Ok(Self::Apple),
            _ => Err(ProviderParseError(s.to_owned())),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Provider {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Provider {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Provider {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_federated_names() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("Facebook".parse::<Provider>().unwrap(), Provider::Facebook);
        assert_eq!("apple.com".parse::<Provider>().unwrap(), Provider::Apple);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "github".parse::<Provider>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported identity provider: github");
    }

    #[test]
    fn test_federated_id_roundtrip() {
        for provider in Provider::ALL {
            assert_eq!(
                Provider::from_federated_id(provider.federated_id()),
                Some(provider)
            );
        }
        assert_eq!(Provider::from_federated_id("password"), None);
    }

    #[test]
    fn test_only_apple_decodes_locally() {
        assert!(Provider::Apple.decodes_identity_token_locally());
        assert!(!Provider::Google.decodes_identity_token_locally());
        assert!(!Provider::Facebook.decodes_identity_token_locally());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Provider::Facebook).unwrap();
        assert_eq!(json, "\"facebook\"");
    }
}
