//! Apple: the identity token is decoded locally.

use social_signin_core::{
    Email, ExpiryInfo, IdentityClaim, PersonName, Provider, ProviderUserId, claim::non_blank,
};

use super::NormalizeError;
use super::id_token::{AppleIdTokenClaims, decode_payload};
use crate::models::{AppleCredential, FederatedIdentity};

pub(super) fn normalize(
    credential: &AppleCredential,
    federated: &FederatedIdentity,
) -> Result<IdentityClaim, NormalizeError> {
    let token = non_blank(credential.identity_token.as_deref())
        .ok_or(NormalizeError::MissingIdentityToken(Provider::Apple))?;

    let claims: AppleIdTokenClaims = decode_payload(token)?;
    let expires_at = claims.expires_at()?;

    let provider_user_id = non_blank(claims.sub.as_deref())
        .and_then(|sub| ProviderUserId::parse(sub).ok())
        .ok_or(NormalizeError::MissingProviderUserId(Provider::Apple))?;

    // The token email is authoritative; the credential copy only appears on
    // first authorization.
    let email = Email::from_provider(claims.email.as_deref())
        .or_else(|| Email::from_provider(credential.email.as_deref()));

    let email_verified = claims
        .email_verified
        .map(|v| v.value())
        .or(federated.email_verified)
        .unwrap_or(false);

    let full_name = credential.full_name.as_ref();

    Ok(IdentityClaim {
        provider: Provider::Apple,
        provider_user_id,
        email,
        email_verified,
        display_name: full_name.and_then(PersonName::display_name),
        given_name: full_name.and_then(PersonName::given).map(str::to_owned),
        family_name: full_name.and_then(PersonName::family).map(str::to_owned),
        profile_photo_url: None,
        raw_expiry_info: ExpiryInfo::IdentityToken { expires_at },
        issued_at: credential.obtained_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::normalize::id_token::tests::token_for;

    fn credential(token: Option<String>, full_name: Option<PersonName>) -> AppleCredential {
        AppleCredential {
            user: Some("a1".to_owned()),
            identity_token: token,
            authorization_code: Some("c0de".to_owned()),
            full_name,
            email: None,
            nonce: None,
            obtained_at: Utc::now(),
        }
    }

    fn token(sub: &str, email: Option<&str>) -> String {
        let mut payload = serde_json::json!({
            "iss": "https://appleid.apple.com",
            "sub": sub,
            "exp": 1_769_252_400,
            "email_verified": true
        });
        if let Some(email) = email {
            payload["email"] = serde_json::Value::String(email.to_owned());
        }
        token_for(&payload)
    }

    #[test]
    fn test_decodes_token_and_first_name() {
        let name = PersonName {
            given_name: Some("Jo".to_owned()),
            family_name: None,
        };
        let claim = normalize(
            &credential(Some(token("a1", Some("jo@privaterelay.appleid.com"))), Some(name)),
            &FederatedIdentity::default(),
        )
        .unwrap();

        assert_eq!(claim.provider_user_id.as_str(), "a1");
        assert!(claim.email.as_ref().unwrap().is_private_relay());
        assert!(claim.email_verified);
        assert_eq!(claim.display_name.as_deref(), Some("Jo"));
        assert_eq!(claim.given_name.as_deref(), Some("Jo"));
        assert_eq!(claim.family_name, None);
        assert_eq!(
            claim.raw_expiry_info.expires_at().unwrap().timestamp(),
            1_769_252_400
        );
    }

    #[test]
    fn test_repeat_sign_in_has_no_name() {
        let claim = normalize(
            &credential(Some(token("a1", None)), None),
            &FederatedIdentity::default(),
        )
        .unwrap();
        assert_eq!(claim.display_name, None);
        assert_eq!(claim.email, None);
    }

    #[test]
    fn test_missing_token() {
        for missing in [None, Some(String::new())] {
            let err = normalize(&credential(missing, None), &FederatedIdentity::default())
                .unwrap_err();
            assert_eq!(err, NormalizeError::MissingIdentityToken(Provider::Apple));
        }
    }

    #[test]
    fn test_empty_subject() {
        let err = normalize(
            &credential(Some(token("", None)), None),
            &FederatedIdentity::default(),
        )
        .unwrap_err();
        assert_eq!(err, NormalizeError::MissingProviderUserId(Provider::Apple));
    }

    #[test]
    fn test_malformed_token() {
        let err = normalize(
            &credential(Some("not-a-jwt".to_owned()), None),
            &FederatedIdentity::default(),
        )
        .unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedToken(_)));
    }
}
