//! Google: claim fields come from the backend exchange.

use social_signin_core::{
    Email, ExpiryInfo, IdentityClaim, Provider, ProviderUserId, claim::non_blank,
};

use super::NormalizeError;
use crate::models::{FederatedIdentity, GoogleCredential};

pub(super) fn normalize(
    credential: &GoogleCredential,
    federated: &FederatedIdentity,
) -> Result<IdentityClaim, NormalizeError> {
    // The SDK's user id is only a fallback for a backend that omitted it.
    let provider_user_id = non_blank(federated.provider_user_id.as_deref())
        .or_else(|| non_blank(credential.user_id.as_deref()))
        .and_then(|id| ProviderUserId::parse(id).ok())
        .ok_or(NormalizeError::MissingProviderUserId(Provider::Google))?;

    Ok(IdentityClaim {
        provider: Provider::Google,
        provider_user_id,
        email: Email::from_provider(federated.email.as_deref()),
        email_verified: federated.email_verified.unwrap_or(false),
        display_name: non_blank(federated.display_name.as_deref()).map(str::to_owned),
        given_name: None,
        family_name: None,
        profile_photo_url: non_blank(federated.photo_url.as_deref()).map(str::to_owned),
        raw_expiry_info: ExpiryInfo::SdkReported {
            expires_at: credential.expires_at,
        },
        issued_at: credential.obtained_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn credential(user_id: Option<&str>) -> GoogleCredential {
        GoogleCredential {
            id_token: Some("opaque.google.token".to_owned()),
            access_token: None,
            user_id: user_id.map(str::to_owned),
            obtained_at: Utc.with_ymd_and_hms(2026, 1, 24, 10, 0, 0).unwrap(),
            expires_at: Some(Utc.with_ymd_and_hms(2026, 1, 24, 11, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_trusts_federated_fields() {
        let federated = FederatedIdentity {
            provider_user_id: Some("g1".to_owned()),
            email: Some("jo@gmail.com".to_owned()),
            email_verified: Some(true),
            display_name: Some("Jo Bloggs".to_owned()),
            photo_url: Some("https://lh3.example/photo.jpg".to_owned()),
        };
        let claim = normalize(&credential(Some("sdk-id")), &federated).unwrap();
        assert_eq!(claim.provider_user_id.as_str(), "g1");
        assert_eq!(claim.email.unwrap().as_str(), "jo@gmail.com");
        assert!(claim.email_verified);
        assert_eq!(claim.display_name.as_deref(), Some("Jo Bloggs"));
        assert_eq!(
            claim.profile_photo_url.as_deref(),
            Some("https://lh3.example/photo.jpg")
        );
        assert!(matches!(
            claim.raw_expiry_info,
            ExpiryInfo::SdkReported { expires_at: Some(_) }
        ));
    }

    #[test]
    fn test_falls_back_to_sdk_user_id() {
        let claim = normalize(&credential(Some("sdk-id")), &FederatedIdentity::default()).unwrap();
        assert_eq!(claim.provider_user_id.as_str(), "sdk-id");
        assert!(!claim.email_verified);
        assert_eq!(claim.email, None);
    }

    #[test]
    fn test_missing_user_id() {
        let federated = FederatedIdentity {
            provider_user_id: Some("  ".to_owned()),
            ..FederatedIdentity::default()
        };
        let err = normalize(&credential(None), &federated).unwrap_err();
        assert_eq!(err, NormalizeError::MissingProviderUserId(Provider::Google));
    }
}
