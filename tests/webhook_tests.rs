//! Webhook authentication and entitlement grants

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Duration;
use pretty_assertions::assert_eq;

use a11y_gate::entitlement::{EntitlementStore, InMemoryEntitlementStore};
use a11y_gate::identity::Identity;
use a11y_gate::metrics::global_metrics;
use a11y_gate::stripe::{
    EventProcessor, SignatureVerifier, StripeWebhookError, WebhookOutcome, WebhookVerifier,
};

use common::{completed_checkout, event_of_type, signer, t0};

fn verifier() -> (Arc<InMemoryEntitlementStore>, WebhookVerifier) {
    let store = Arc::new(InMemoryEntitlementStore::new());
    let webhook = WebhookVerifier::new(signer(), EventProcessor::new(store.clone()));
    (store, webhook)
}

#[tokio::test]
async fn test_completed_checkout_grants_24h() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));
    let header = signer().header_for(t0().timestamp(), &body);

    let outcome = webhook.handle(&body, Some(&header), t0()).await.unwrap();

    let identity = Identity::from("203.0.113.9");
    assert_eq!(
        outcome,
        WebhookOutcome::Granted {
            identity: identity.clone(),
            until: t0() + Duration::hours(24),
        }
    );
    assert!(store.is_active(&identity, t0() + Duration::hours(23)).await);
    assert!(!store.is_active(&identity, t0() + Duration::hours(24)).await);
}

#[tokio::test]
async fn test_sparse_completed_checkout_still_grants() {
    let (store, webhook) = verifier();
    let body = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"metadata":{"user_ip":"1.2.3.4","order":7}}}}"#;
    let header = signer().header_for(t0().timestamp(), body);

    let outcome = webhook.handle(body, Some(&header), t0()).await.unwrap();

    let identity = Identity::from("1.2.3.4");
    assert_eq!(
        outcome,
        WebhookOutcome::Granted {
            identity: identity.clone(),
            until: t0() + Duration::hours(24),
        }
    );
    assert!(store.is_active(&identity, t0()).await);
}

#[tokio::test]
async fn test_redelivery_resets_expiry_from_delivery_time() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));

    for delivered in [t0(), t0() + Duration::hours(5)] {
        let header = signer().header_for(delivered.timestamp(), &body);
        webhook.handle(&body, Some(&header), delivered).await.unwrap();
    }

    assert_eq!(
        store.expires_at(&Identity::from("203.0.113.9")).await,
        Some(t0() + Duration::hours(29))
    );
}

#[tokio::test]
async fn test_missing_metadata_is_acknowledged_without_grant() {
    let (store, webhook) = verifier();
    let before = global_metrics()
        .unattributed_checkouts_total
        .load(Ordering::Relaxed);

    let body = completed_checkout(None);
    let header = signer().header_for(t0().timestamp(), &body);
    let outcome = webhook.handle(&body, Some(&header), t0()).await.unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Unattributed {
            session_id: "cs_test_1".into()
        }
    );
    assert!(store.is_empty().await);
    assert!(
        global_metrics()
            .unattributed_checkouts_total
            .load(Ordering::Relaxed)
            > before
    );
}

#[tokio::test]
async fn test_other_event_types_are_ignored() {
    let (store, webhook) = verifier();
    for event_type in ["payment_intent.succeeded", "checkout.session.expired"] {
        let body = event_of_type(event_type);
        let header = signer().header_for(t0().timestamp(), &body);
        let outcome = webhook.handle(&body, Some(&header), t0()).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: event_type.to_string()
            }
        );
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));

    let err = webhook.handle(&body, None, t0()).await.unwrap_err();
    assert!(matches!(err, StripeWebhookError::MissingSignature));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));
    let forged = SignatureVerifier::new("whsec_attacker", Duration::seconds(300))
        .header_for(t0().timestamp(), &body);

    let err = webhook.handle(&body, Some(&forged), t0()).await.unwrap_err();
    assert!(matches!(err, StripeWebhookError::SignatureMismatch));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_tampered_body_rejected() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));
    let header = signer().header_for(t0().timestamp(), &body);
    let tampered = completed_checkout(Some("198.51.100.1"));

    let err = webhook.handle(&tampered, Some(&header), t0()).await.unwrap_err();
    assert!(err.is_signature_failure());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));
    let signed_at = t0() - Duration::minutes(10);
    let header = signer().header_for(signed_at.timestamp(), &body);

    let err = webhook.handle(&body, Some(&header), t0()).await.unwrap_err();
    assert!(matches!(
        err,
        StripeWebhookError::TimestampOutOfTolerance { age_secs: 600, .. }
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_signed_garbage_is_invalid_payload() {
    let (_store, webhook) = verifier();
    let body = b"not json at all".to_vec();
    let header = signer().header_for(t0().timestamp(), &body);

    let err = webhook.handle(&body, Some(&header), t0()).await.unwrap_err();
    assert!(matches!(err, StripeWebhookError::InvalidPayload(_)));
    assert!(!err.is_signature_failure());
}

#[tokio::test]
async fn test_any_matching_v1_accepted_during_rotation() {
    let (store, webhook) = verifier();
    let body = completed_checkout(Some("203.0.113.9"));
    let ts = t0().timestamp();
    let old = SignatureVerifier::new("whsec_old", Duration::seconds(300)).sign(ts, &body);
    let current = signer().sign(ts, &body);
    let header = format!("t={ts},v1={old},v1={current}");

    webhook.handle(&body, Some(&header), t0()).await.unwrap();
    assert!(!store.is_empty().await);
}
