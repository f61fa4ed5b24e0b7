//! Stripe Event Types
//!
//! Strongly-typed representations of the Stripe webhook events the gateway
//! cares about. Only `checkout.session.completed` has a side effect; every
//! other type is acknowledged and ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::Identity;
use crate::stripe::error::{StripeWebhookError, StripeWebhookResult};

/// Metadata key carrying the purchaser's identity on a checkout session
pub const IDENTITY_METADATA_KEY: &str = "user_ip";

/// Stripe event types we distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StripeEventType {
    /// Checkout finished and payment was collected
    #[serde(rename = "checkout.session.completed")]
    CheckoutSessionCompleted,
    /// Checkout session expired without payment
    #[serde(rename = "checkout.session.expired")]
    CheckoutSessionExpired,
    /// Delayed payment method settled
    #[serde(rename = "checkout.session.async_payment_succeeded")]
    CheckoutSessionAsyncPaymentSucceeded,
    /// Delayed payment method failed
    #[serde(rename = "checkout.session.async_payment_failed")]
    CheckoutSessionAsyncPaymentFailed,

    /// Catch-all for events we don't explicitly handle
    #[serde(other)]
    Unknown,
}

impl From<&str> for StripeEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            "checkout.session.async_payment_succeeded" => {
                Self::CheckoutSessionAsyncPaymentSucceeded
            }
            "checkout.session.async_payment_failed" => Self::CheckoutSessionAsyncPaymentFailed,
            _ => Self::Unknown,
        }
    }
}

impl StripeEventType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CheckoutSessionExpired => "checkout.session.expired",
            Self::CheckoutSessionAsyncPaymentSucceeded => {
                "checkout.session.async_payment_succeeded"
            }
            Self::CheckoutSessionAsyncPaymentFailed => "checkout.session.async_payment_failed",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this event type carries a checkout session object
    pub fn is_checkout(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Generic Stripe event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    /// Unique identifier for the event
    pub id: String,

    /// Type of event
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time of event creation (Unix timestamp)
    #[serde(default)]
    pub created: i64,

    /// API version used to render data
    #[serde(default)]
    pub api_version: Option<String>,

    /// Whether this is a live mode event
    #[serde(default)]
    pub livemode: bool,

    /// Object containing event data
    pub data: EventData,
}

impl StripeEvent {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> StripeWebhookResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StripeWebhookError::InvalidPayload(e.to_string()))
    }

    /// Get the typed event type
    pub fn typed_event_type(&self) -> StripeEventType {
        StripeEventType::from(self.event_type.as_str())
    }

    /// Extract the checkout session from event data
    pub fn as_checkout_session(&self) -> StripeWebhookResult<CheckoutSession> {
        if !self.typed_event_type().is_checkout() {
            return Err(StripeWebhookError::InvalidPayload(format!(
                "Event {} is not a checkout session event",
                self.event_type
            )));
        }
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| StripeWebhookError::InvalidPayload(e.to_string()))
    }
}

/// Event data container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The actual event object
    pub object: serde_json::Value,
}

/// Stripe checkout session object (the subset we read)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID (cs_...)
    #[serde(default)]
    pub id: String,
    /// Hosted checkout URL (present while the session is open)
    #[serde(default)]
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Total in the smallest currency unit
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Three-letter ISO currency code
    #[serde(default)]
    pub currency: Option<String>,
    /// Metadata attached when the session was created
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl CheckoutSession {
    /// Identity the session was created for, if it round-tripped
    pub fn identity(&self) -> Option<Identity> {
        self.metadata
            .as_ref()?
            .get(IDENTITY_METADATA_KEY)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(Identity::new)
    }
}
