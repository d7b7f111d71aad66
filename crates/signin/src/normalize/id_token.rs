//! Unverified decoding of a compact JWT payload.
//!
//! Signature verification belongs to the backend exchange. This only reads
//! the claims the client needs before that verification is trusted.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::NormalizeError;

/// Claims carried by a Sign in with Apple identity token.
#[derive(Debug, Clone, Deserialize)]
pub struct AppleIdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<JsonBool>,
    #[serde(default)]
    pub is_private_email: Option<JsonBool>,
}

impl AppleIdTokenClaims {
    /// `exp` as a timestamp.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError::MalformedToken` if `exp` is out of range.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, NormalizeError> {
        DateTime::from_timestamp(self.exp, 0)
            .ok_or_else(|| NormalizeError::MalformedToken(format!("exp out of range: {}", self.exp)))
    }
}

/// Apple sends booleans either as JSON booleans or as `"true"`/`"false"`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum JsonBool {
    Bool(bool),
    Text(TextBool),
}

impl JsonBool {
    #[must_use]
    pub const fn value(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Text(TextBool::True) => true,
            Self::Text(TextBool::False) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub enum TextBool {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
}

/// Decode the payload segment of a compact JWT.
///
/// # Errors
///
/// Returns `NormalizeError::MalformedToken` if the token does not have three
/// segments, the payload is not base64url or the JSON does not match `T`.
pub fn decode_payload<T: serde::de::DeserializeOwned>(token: &str) -> Result<T, NormalizeError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(NormalizeError::MalformedToken(
            "expected three dot-separated segments".to_owned(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| NormalizeError::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| NormalizeError::MalformedToken(format!("payload is not valid claims: {e}")))
}
