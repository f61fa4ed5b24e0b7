//! Stripe error types

use thiserror::Error;

/// Failures while authenticating or parsing an inbound webhook.
///
/// Every variant is a rejection at the trust boundary: the request gets a
/// 400 and no entitlement state is touched.
#[derive(Error, Debug)]
pub enum StripeWebhookError {
    /// No `Stripe-Signature` header on the request
    #[error("No stripe-signature header value was provided.")]
    MissingSignature,

    /// Header present but not in `t=...,v1=...` form
    #[error("Unable to extract timestamp and signatures from header: {0}")]
    InvalidSignatureHeader(String),

    /// No `v1` signature matched the payload
    #[error("No signatures found matching the expected signature for payload.")]
    SignatureMismatch,

    /// Signed timestamp is outside the replay tolerance
    #[error("Timestamp outside the tolerance zone ({age_secs}s old, tolerance {tolerance_secs}s)")]
    TimestampOutOfTolerance {
        /// Age of the signed timestamp in seconds (negative if in the future)
        age_secs: i64,
        /// Configured tolerance in seconds
        tolerance_secs: i64,
    },

    /// Signature was fine but the body is not a Stripe event
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl StripeWebhookError {
    /// Whether the failure is about authenticity rather than payload shape
    pub fn is_signature_failure(&self) -> bool {
        !matches!(self, StripeWebhookError::InvalidPayload(_))
    }
}

/// Result type for webhook operations
pub type StripeWebhookResult<T> = std::result::Result<T, StripeWebhookError>;

/// Payment provider failures while creating a checkout session.
///
/// Surfaced to the caller as a 500 with the message passed through; never
/// retried locally.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure talking to the provider
    #[error("{0}")]
    Request(String),

    /// Provider answered with an error object
    #[error("{message}")]
    Api {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider's error message
        message: String,
    },

    /// Provider answered 2xx but without a usable redirect
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_failure_classification() {
        assert!(StripeWebhookError::SignatureMismatch.is_signature_failure());
        assert!(StripeWebhookError::MissingSignature.is_signature_failure());
        assert!(!StripeWebhookError::InvalidPayload("eof".into()).is_signature_failure());
    }

    #[test]
    fn test_provider_api_message_passthrough() {
        let err = ProviderError::Api {
            status: 401,
            message: "Invalid API Key provided: sk_test_***".into(),
        };
        assert_eq!(err.to_string(), "Invalid API Key provided: sk_test_***");
    }
}
