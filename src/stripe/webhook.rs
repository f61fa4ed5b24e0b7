//! Webhook verification pipeline
//!
//! ```text
//! raw body + Stripe-Signature ──> verify ──> parse ──> dispatch ──> grant
//!                                   │          │
//!                                   ▼          ▼
//!                                 400        400      (state untouched)
//! ```
//!
//! Once verification passes the caller always acknowledges with 200, whether
//! or not a grant happened, so the provider does not keep redelivering a
//! handled event.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::entitlement::EntitlementStore;
use crate::metrics::global_metrics;
use crate::stripe::config::StripeConfig;
use crate::stripe::error::StripeWebhookResult;
use crate::stripe::events::StripeEvent;
use crate::stripe::processor::{EventProcessor, WebhookOutcome};
use crate::stripe::signature::SignatureVerifier;

/// Authenticates inbound payment notifications and applies their effects
#[derive(Clone)]
pub struct WebhookVerifier {
    signatures: SignatureVerifier,
    processor: EventProcessor,
}

impl WebhookVerifier {
    /// Build from its parts
    pub fn new(signatures: SignatureVerifier, processor: EventProcessor) -> Self {
        Self {
            signatures,
            processor,
        }
    }

    /// Build from Stripe configuration and the shared entitlement store
    pub fn from_config(config: &StripeConfig, entitlements: Arc<dyn EntitlementStore>) -> Self {
        Self::new(
            SignatureVerifier::new(&config.webhook_secret, config.signature_tolerance),
            EventProcessor::new(entitlements),
        )
    }

    /// Verify and process one delivery.
    ///
    /// `payload` must be the request body exactly as received.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> StripeWebhookResult<WebhookOutcome> {
        global_metrics().record_webhook();

        let event = match self
            .signatures
            .verify(payload, signature, now)
            .and_then(|()| StripeEvent::from_bytes(payload))
        {
            Ok(event) => event,
            Err(e) => {
                global_metrics().record_webhook_rejection();
                tracing::error!(
                    error = %e,
                    signature_failure = e.is_signature_failure(),
                    body_len = payload.len(),
                    "Webhook rejected"
                );
                return Err(e);
            }
        };

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Webhook received"
        );

        self.processor.process(&event, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::InMemoryEntitlementStore;
    use crate::identity::Identity;
    use crate::stripe::error::StripeWebhookError;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn setup() -> (WebhookVerifier, SignatureVerifier, Arc<InMemoryEntitlementStore>) {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let signer = SignatureVerifier::new("whsec_unit", Duration::seconds(300));
        let verifier = WebhookVerifier::new(signer.clone(), EventProcessor::new(store.clone()));
        (verifier, signer, store)
    }

    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed","created":1700000000,"livemode":false,"data":{"object":{"id":"cs_1","metadata":{"user_ip":"9.9.9.9"}}}}"#;

    #[tokio::test]
    async fn test_valid_delivery_grants() {
        let (verifier, signer, store) = setup();
        let header = signer.header_for(now().timestamp(), BODY);

        let outcome = verifier.handle(BODY, Some(&header), now()).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Granted { .. }));
        assert!(store.is_active(&Identity::from("9.9.9.9"), now()).await);
    }

    #[tokio::test]
    async fn test_invalid_signature_leaves_store_untouched() {
        let (verifier, _, store) = setup();
        let forged = SignatureVerifier::new("whsec_other", Duration::seconds(300))
            .header_for(now().timestamp(), BODY);

        let result = verifier.handle(BODY, Some(&forged), now()).await;
        assert!(matches!(result, Err(StripeWebhookError::SignatureMismatch)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_signed_garbage_is_rejected() {
        let (verifier, signer, store) = setup();
        let body = b"{not json";
        let header = signer.header_for(now().timestamp(), body);

        let result = verifier.handle(body, Some(&header), now()).await;
        assert!(matches!(result, Err(StripeWebhookError::InvalidPayload(_))));
        assert!(store.is_empty().await);
    }
}
