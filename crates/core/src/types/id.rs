//! Newtype identifiers for type-safe identity references.
//!
//! Use the `define_string_id!` macro to create wrappers that keep a backend
//! `uid` from being confused with a provider-scoped user id.

/// Errors that can occur when parsing an identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input is empty or whitespace only.
    #[error("identifier cannot be empty")]
    Empty,
}

/// Macro to define a type-safe string identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - A validating `parse()` that rejects blank input
/// - `is_blank()` for re-validating values that arrived through serde
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// Deserialization does not validate: stored documents are trusted the same
/// way database rows are, and consumers that care call `is_blank()`.
///
/// # Example
///
/// ```rust
/// # use social_signin_core::define_string_id;
/// define_string_id!(TenantId);
///
/// let tenant = TenantId::parse("acme").unwrap();
/// assert_eq!(tenant.as_str(), "acme");
/// assert!(TenantId::parse("  ").is_err());
/// ```
#[macro_export]
macro_rules! define_string_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty or whitespace-only input.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Empty` if the input has no visible characters.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::IdError> {
                if s.trim().is_empty() {
                    return Err($crate::IdError::Empty);
                }
                Ok(Self(s.to_owned()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the identifier has no visible characters.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let s = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(s))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Backend-issued user id. Profiles are keyed by this, never by a provider id.
define_string_id!(Uid);

// Stable per-provider user id (Google `sub`, Facebook Graph `id`, Apple `sub`).
define_string_id!(ProviderUserId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!(Uid::parse(""), Err(IdError::Empty));
        assert_eq!(ProviderUserId::parse(" \t"), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_keeps_value_verbatim() {
        let id = ProviderUserId::parse("001234.abcd.5678").unwrap();
        assert_eq!(id.as_str(), "001234.abcd.5678");
        assert_eq!(id.to_string(), "001234.abcd.5678");
    }

    #[test]
    fn test_deserialize_does_not_validate() {
        let id: ProviderUserId = serde_json::from_str("\"\"").unwrap();
        assert!(id.is_blank());
    }

    #[test]
    fn test_serde_transparent() {
        let uid = Uid::parse("uid-1").unwrap();
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"uid-1\"");
    }
}
