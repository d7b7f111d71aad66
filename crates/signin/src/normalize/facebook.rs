//! Facebook: claim fields come from the Graph API profile.

use social_signin_core::{
    Email, ExpiryInfo, IdentityClaim, PersonName, Provider, ProviderUserId, claim::non_blank,
};

use super::NormalizeError;
use crate::models::{FacebookCredential, FederatedIdentity};

pub(super) fn normalize(
    credential: &FacebookCredential,
    federated: &FederatedIdentity,
) -> Result<IdentityClaim, NormalizeError> {
    let profile = &credential.profile;

    let provider_user_id = non_blank(profile.id.as_deref())
        .and_then(|id| ProviderUserId::parse(id).ok())
        .ok_or(NormalizeError::MissingProviderUserId(Provider::Facebook))?;

    let display_name = non_blank(profile.name.as_deref())
        .map(str::to_owned)
        .or_else(|| {
            PersonName {
                given_name: profile.first_name.clone(),
                family_name: profile.last_name.clone(),
            }
            .display_name()
        });

    Ok(IdentityClaim {
        provider: Provider::Facebook,
        provider_user_id,
        email: Email::from_provider(profile.email.as_deref()),
        // Graph does not report verification.
        email_verified: federated.email_verified.unwrap_or(false),
        display_name,
        given_name: None,
        family_name: None,
        profile_photo_url: profile.picture_url().map(str::to_owned),
        raw_expiry_info: ExpiryInfo::SdkReported {
            expires_at: credential.expires_at,
        },
        issued_at: credential.obtained_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{GraphPicture, GraphPictureData, GraphProfile};

    fn credential(profile: GraphProfile) -> FacebookCredential {
        FacebookCredential {
            access_token: Some("EAAB".to_owned()),
            obtained_at: Utc::now(),
            expires_at: None,
            profile,
        }
    }

    fn full_profile() -> GraphProfile {
        GraphProfile {
            id: Some("f1".to_owned()),
            name: Some("Jo Bloggs".to_owned()),
            email: Some("jo@x.com".to_owned()),
            first_name: Some("Jo".to_owned()),
            last_name: Some("Bloggs".to_owned()),
            picture: Some(GraphPicture {
                data: Some(GraphPictureData {
                    url: Some("https://graph.example/large.jpg".to_owned()),
                    is_silhouette: Some(false),
                }),
            }),
        }
    }

    #[test]
    fn test_maps_graph_profile() {
        let claim = normalize(&credential(full_profile()), &FederatedIdentity::default()).unwrap();
        assert_eq!(claim.provider, Provider::Facebook);
        assert_eq!(claim.provider_user_id.as_str(), "f1");
        assert_eq!(claim.display_name.as_deref(), Some("Jo Bloggs"));
        assert_eq!(
            claim.profile_photo_url.as_deref(),
            Some("https://graph.example/large.jpg")
        );
        assert!(!claim.email_verified);
        assert_eq!(claim.given_name, None);
    }

    #[test]
    fn test_missing_picture_left_unset() {
        let mut profile = full_profile();
        profile.picture = Some(GraphPicture { data: None });
        let claim = normalize(&credential(profile), &FederatedIdentity::default()).unwrap();
        assert_eq!(claim.profile_photo_url, None);
    }

    #[test]
    fn test_name_from_parts() {
        let mut profile = full_profile();
        profile.name = None;
        profile.last_name = None;
        let claim = normalize(&credential(profile), &FederatedIdentity::default()).unwrap();
        assert_eq!(claim.display_name.as_deref(), Some("Jo"));
    }

    #[test]
    fn test_verified_from_exchange() {
        let federated = FederatedIdentity {
            email_verified: Some(true),
            ..FederatedIdentity::default()
        };
        let claim = normalize(&credential(full_profile()), &federated).unwrap();
        assert!(claim.email_verified);
    }

    #[test]
    fn test_missing_id() {
        let mut profile = full_profile();
        profile.id = Some(String::new());
        let err = normalize(&credential(profile), &FederatedIdentity::default()).unwrap_err();
        assert_eq!(err, NormalizeError::MissingProviderUserId(Provider::Facebook));
    }
}
