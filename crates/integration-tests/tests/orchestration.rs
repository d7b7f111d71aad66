//! Orchestrator failure semantics, loading flags and sign-out.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Duration;
use social_signin::SignInError;
use social_signin::services::{ExchangeError, SdkError};
use social_signin_core::Provider;
use social_signin_integration_tests::{Harness, ScriptedSdk, epoch, facebook, google};
use tokio::sync::Notify;

fn google_sdk() -> ScriptedSdk {
    ScriptedSdk::new().then_sign_in(Ok(google("g1", "jo@gmail.com", "Jo Bloggs")))
}

#[tokio::test]
async fn test_providers_configured_once_before_use() {
    let harness = Harness::new(ScriptedSdk::new()).await;
    assert_eq!(
        *harness.orchestrator.sdk().configured.lock().unwrap(),
        vec![Provider::Google, Provider::Facebook, Provider::Apple]
    );
}

#[tokio::test]
async fn test_successful_sign_in_returns_session() {
    let harness = Harness::new(google_sdk()).await;

    let session = harness
        .orchestrator
        .sign_in(Provider::Google)
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert!(session.persisted);
    assert_eq!(session.profile.email.as_ref().unwrap().as_str(), "jo@gmail.com");
    assert!(session.profile.email_verified);
    assert_eq!(session.claim.provider_user_id.as_str(), "g1");
    assert!(!session.claim.raw_expiry_info.is_expired(epoch()));
    assert!(session.claim.raw_expiry_info.is_expired(epoch() + Duration::hours(2)));
    assert_eq!(harness.exchange.calls(), 1);
    assert_eq!(harness.profiles.puts(), 1);
    assert_eq!(
        harness.session.signed_in(),
        vec![(Provider::Google, session.uid.clone())]
    );
    assert_eq!(
        harness.surface.loading(),
        vec![(Provider::Google, true), (Provider::Google, false)]
    );
}

#[tokio::test]
async fn test_cancel_is_quiet() {
    let harness = Harness::new(ScriptedSdk::new().then_sign_in(Err(SdkError::UserCancelled))).await;

    let outcome = harness.orchestrator.sign_in(Provider::Facebook).await.unwrap();
    assert!(outcome.is_cancelled());
    assert!(outcome.session().is_none());
    assert_eq!(harness.exchange.calls(), 0);
    assert_eq!(harness.profiles.puts(), 0);
    assert!(harness.session.signed_in().is_empty());
    assert!(!harness.orchestrator.is_in_flight(Provider::Facebook));
}

#[tokio::test]
async fn test_transient_error_then_retry() {
    let sdk = ScriptedSdk::new()
        .then_sign_in(Err(SdkError::Network("offline".to_owned())))
        .then_sign_in(Ok(facebook("f1", Some("Jo Bloggs"), None)));
    let harness = Harness::new(sdk).await;

    let err = harness.orchestrator.sign_in(Provider::Facebook).await.unwrap_err();
    assert!(matches!(err, SignInError::TransientProvider { .. }));
    assert!(err.is_retryable());
    assert_eq!(harness.exchange.calls(), 0);

    let retried = harness.orchestrator.sign_in(Provider::Facebook).await.unwrap();
    assert_eq!(
        retried.session().unwrap().profile.name.as_deref(),
        Some("Jo Bloggs")
    );
}

#[tokio::test]
async fn test_backend_refusal_writes_nothing() {
    let harness = Harness::new(google_sdk()).await;
    harness.exchange.refuse_with(ExchangeError::AccountConflict {
        email: Some("jo@gmail.com".to_owned()),
    });

    let err = harness.orchestrator.sign_in(Provider::Google).await.unwrap_err();
    assert!(matches!(
        err,
        SignInError::BackendExchange {
            provider: Provider::Google,
            source: ExchangeError::AccountConflict { .. },
        }
    ));
    assert!(!err.is_retryable());
    assert!(err.remediation_hint().is_some());
    assert_eq!(harness.profiles.gets.load(Ordering::SeqCst), 0);
    assert_eq!(harness.profiles.puts(), 0);
    assert!(harness.session.signed_in().is_empty());
}

#[tokio::test]
async fn test_failed_write_degrades_to_unpersisted_session() {
    let harness = Harness::new(google_sdk()).await;
    harness
        .profiles
        .fail_put
        .store(true, Ordering::SeqCst);

    let session = harness
        .orchestrator
        .sign_in(Provider::Google)
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert!(!session.persisted);
    assert_eq!(session.profile.name.as_deref(), Some("Jo Bloggs"));
    assert_eq!(harness.profiles.puts(), 1);
    assert!(harness.profiles.stored(&session.uid).await.is_none());
    assert_eq!(harness.session.signed_in().len(), 1);
}

#[tokio::test]
async fn test_failed_read_skips_write() {
    let harness = Harness::new(google_sdk()).await;
    harness
        .profiles
        .fail_get
        .store(true, Ordering::SeqCst);

    let session = harness
        .orchestrator
        .sign_in(Provider::Google)
        .await
        .unwrap()
        .into_session()
        .unwrap();

    assert!(!session.persisted);
    assert_eq!(harness.profiles.puts(), 0);
    assert_eq!(session.profile.created_at, session.profile.last_sign_in_time);
    assert_eq!(harness.session.signed_in().len(), 1);
}

#[tokio::test]
async fn test_second_sign_in_for_same_provider_rejected() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::new(google_sdk().gated(Arc::clone(&gate))).await;

    let (first, second) = tokio::join!(harness.orchestrator.sign_in(Provider::Google), async {
        let second = harness.orchestrator.sign_in(Provider::Google).await;
        gate.notify_one();
        second
    });

    assert!(first.unwrap().session().is_some());
    assert!(matches!(
        second.unwrap_err(),
        SignInError::AlreadyInFlight(Provider::Google)
    ));
    assert_eq!(
        harness
            .orchestrator
            .sdk()
            .sign_in_calls
            .load(Ordering::SeqCst),
        1
    );
    assert!(!harness.orchestrator.is_in_flight(Provider::Google));
    assert_eq!(
        harness.surface.loading(),
        vec![(Provider::Google, true), (Provider::Google, false)]
    );
}

#[tokio::test]
async fn test_unmount_mid_flight_still_persists() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::new(google_sdk().gated(Arc::clone(&gate))).await;

    let (outcome, ()) = tokio::join!(harness.orchestrator.sign_in(Provider::Google), async {
        harness.surface.unmount();
        gate.notify_one();
    });

    let session = outcome.unwrap().into_session().unwrap();
    assert!(session.persisted);
    assert_eq!(harness.profiles.puts(), 1);
    assert_eq!(harness.session.signed_in().len(), 1);
    assert_eq!(harness.surface.loading(), vec![(Provider::Google, true)]);
    assert!(!harness.orchestrator.is_in_flight(Provider::Google));
}

#[tokio::test]
async fn test_sign_out_reports_sdk_failure_after_local_cleanup() {
    let sdk = google_sdk().failing_sign_out(SdkError::Provider("revoke failed".to_owned()));
    let harness = Harness::new(sdk).await;
    harness.orchestrator.sign_in(Provider::Google).await.unwrap();

    let err = harness.orchestrator.sign_out(Provider::Google).await.unwrap_err();
    assert!(matches!(err, SignInError::TransientProvider { .. }));
    assert_eq!(harness.session.signed_out(), vec![Provider::Google]);

    harness.orchestrator.sign_out(Provider::Google).await.unwrap();
    assert_eq!(harness.session.signed_out().len(), 2);
}
