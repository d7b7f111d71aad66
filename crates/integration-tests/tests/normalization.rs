//! Normalizer behavior seen through the public API.

#![allow(clippy::unwrap_used)]

use social_signin::models::{FederatedIdentity, IdpAssertion, RawCredential};
use social_signin::{NormalizeError, normalize};
use social_signin_core::{ExpiryInfo, Provider};
use social_signin_integration_tests::{
    FlakyProfileStore, Harness, ScriptedSdk, apple_credential, facebook, facebook_token, google,
    uid,
};

#[test]
fn test_apple_without_token_yields_no_claim() {
    for token in [None, Some(String::new()), Some("  ".to_owned())] {
        let mut credential = apple_credential("a1", "jo@x.com", Some("Jo"));
        credential.identity_token = token;
        let raw = RawCredential::Apple(credential);

        assert_eq!(
            normalize(&raw, &FederatedIdentity::default()),
            Err(NormalizeError::MissingIdentityToken(Provider::Apple))
        );
        assert!(IdpAssertion::from_credential(&raw).is_err());
    }
}

#[test]
fn test_apple_token_without_subject() {
    let mut credential = apple_credential("a1", "", None);
    credential.identity_token = Some(social_signin_integration_tests::id_token(
        &serde_json::json!({"sub": "", "exp": 1_900_000_000}),
    ));
    let err = normalize(&RawCredential::Apple(credential), &FederatedIdentity::default());
    assert_eq!(err, Err(NormalizeError::MissingProviderUserId(Provider::Apple)));
}

#[test]
fn test_apple_expiry_comes_from_token() {
    let claim = normalize(
        &RawCredential::Apple(apple_credential("a1", "", None)),
        &FederatedIdentity::default(),
    )
    .unwrap();
    assert!(matches!(claim.raw_expiry_info, ExpiryInfo::IdentityToken { .. }));
}

#[test]
fn test_google_trusts_backend_fields() {
    let federated = FederatedIdentity {
        provider_user_id: Some("g-backend".to_owned()),
        email: Some("jo@gmail.com".to_owned()),
        email_verified: Some(true),
        display_name: Some("Jo Backend".to_owned()),
        photo_url: None,
    };
    let claim = normalize(&google("g1", "ignored@gmail.com", "Ignored"), &federated).unwrap();
    assert_eq!(claim.provider_user_id.as_str(), "g-backend");
    assert_eq!(claim.display_name.as_deref(), Some("Jo Backend"));
    assert_eq!(claim.email.unwrap().as_str(), "jo@gmail.com");
    assert_eq!(claim.profile_photo_url, None);
}

#[test]
fn test_google_falls_back_to_sdk_user_id() {
    let claim = normalize(&google("g1", "jo@gmail.com", "Jo"), &FederatedIdentity::default()).unwrap();
    assert_eq!(claim.provider_user_id.as_str(), "g1");
    assert!(!claim.email_verified);
}

#[tokio::test]
async fn test_facebook_without_picture_keeps_stored_photo() {
    let account = uid("uid-1");
    let sdk = ScriptedSdk::new()
        .then_sign_in(Ok(facebook("f1", Some("Jo"), Some("https://graph.example/f1.jpg"))))
        .then_sign_in(Ok(facebook("f1", Some("Jo Bloggs"), None)));
    let harness = Harness::with_profiles(sdk, FlakyProfileStore::new()).await;
    harness.link(Provider::Facebook, &facebook_token("f1"), &account);

    harness.orchestrator.sign_in(Provider::Facebook).await.unwrap();
    harness.orchestrator.sign_in(Provider::Facebook).await.unwrap();

    let stored = harness.profiles.stored(&account).await.unwrap();
    assert_eq!(stored.name.as_deref(), Some("Jo Bloggs"));
    assert_eq!(
        stored.profile_photo_url.as_deref(),
        Some("https://graph.example/f1.jpg")
    );
    assert_eq!(stored.provider_ids.len(), 1);
}
