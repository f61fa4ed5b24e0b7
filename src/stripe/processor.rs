//! Verified event dispatch
//!
//! Runs only after signature verification has passed. A completed checkout
//! carrying an identity in its metadata writes an entitlement of
//! `now + grant_duration`; everything else is acknowledged without side
//! effects. Redelivery of the same event simply overwrites the same entry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::entitlement::EntitlementStore;
use crate::identity::Identity;
use crate::metrics::global_metrics;
use crate::stripe::error::StripeWebhookResult;
use crate::stripe::events::{StripeEvent, StripeEventType};

/// Length of the paid unlock
pub const DEFAULT_GRANT_DURATION_HOURS: i64 = 24;

/// What processing a verified event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Entitlement written
    Granted {
        /// Purchaser
        identity: Identity,
        /// New expiry
        until: DateTime<Utc>,
    },
    /// Completed checkout with no identity in its metadata; nothing written
    Unattributed {
        /// Checkout session ID, for reconciliation
        session_id: String,
    },
    /// Event type has no side effect here
    Ignored {
        /// Raw event type
        event_type: String,
    },
}

/// Dispatches verified events and grants entitlements
#[derive(Clone)]
pub struct EventProcessor {
    entitlements: Arc<dyn EntitlementStore>,
    grant_duration: Duration,
}

impl EventProcessor {
    /// Create a processor writing grants of the default length
    pub fn new(entitlements: Arc<dyn EntitlementStore>) -> Self {
        Self::with_grant_duration(entitlements, Duration::hours(DEFAULT_GRANT_DURATION_HOURS))
    }

    /// Create a processor with a custom grant length
    pub fn with_grant_duration(
        entitlements: Arc<dyn EntitlementStore>,
        grant_duration: Duration,
    ) -> Self {
        Self {
            entitlements,
            grant_duration,
        }
    }

    /// Process one verified event at time `now`
    pub async fn process(
        &self,
        event: &StripeEvent,
        now: DateTime<Utc>,
    ) -> StripeWebhookResult<WebhookOutcome> {
        match event.typed_event_type() {
            StripeEventType::CheckoutSessionCompleted => {
                let session = event.as_checkout_session()?;
                let Some(identity) = session.identity() else {
                    // Paid but unattributable; surfaced for manual reconciliation
                    global_metrics().record_unattributed_checkout();
                    tracing::warn!(
                        event_id = %event.id,
                        session_id = %session.id,
                        amount_total = ?session.amount_total,
                        "Completed checkout without identity metadata, no entitlement granted"
                    );
                    return Ok(WebhookOutcome::Unattributed {
                        session_id: session.id,
                    });
                };

                let until = now + self.grant_duration;
                self.entitlements.set_entitlement(&identity, until).await;
                global_metrics().record_grant();
                tracing::info!(
                    event_id = %event.id,
                    session_id = %session.id,
                    identity = %identity,
                    until = %until,
                    "Unlimited scans unlocked"
                );

                Ok(WebhookOutcome::Granted { identity, until })
            }
            _ => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Ignoring event type"
                );
                Ok(WebhookOutcome::Ignored {
                    event_type: event.event_type.clone(),
                })
            }
        }
    }
}
