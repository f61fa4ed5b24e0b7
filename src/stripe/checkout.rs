//! Checkout session creation
//!
//! Builds a hosted checkout for the single "24-hour unlimited scans" SKU and
//! tags it with the caller's identity so the completion webhook can attribute
//! the payment. Provider failures are passed through once, never retried.

use serde::Deserialize;

use crate::identity::Identity;
use crate::stripe::config::StripeConfig;
use crate::stripe::error::ProviderError;
use crate::stripe::events::IDENTITY_METADATA_KEY;

/// The one product on sale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockSku {
    /// Product name shown on the checkout page
    pub name: &'static str,
    /// Product description shown on the checkout page
    pub description: &'static str,
    /// Price in the smallest currency unit
    pub unit_amount: u32,
    /// ISO currency code
    pub currency: &'static str,
}

/// 24-hour unlimited-scan unlock
pub const UNLOCK_SKU: UnlockSku = UnlockSku {
    name: "Accessibility Scanner — Unlimited Scans (24h Access)",
    description: "Unlock unlimited accessibility scans for 24 hours.",
    unit_amount: 799,
    currency: "gbp",
};

/// Where to send the buyer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    /// Provider session ID
    pub session_id: String,
    /// Hosted checkout page
    pub url: String,
}

/// Payment provider seam for creating checkout sessions
#[async_trait::async_trait]
pub trait CheckoutProvider: Send + Sync + 'static {
    /// Create a checkout session for `identity`
    async fn create_session(&self, identity: &Identity) -> Result<CheckoutRedirect, ProviderError>;
}

/// Stripe Checkout client (REST, form-encoded)
#[derive(Clone)]
pub struct StripeCheckoutClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl StripeCheckoutClient {
    /// Create a client with its own connection pool
    pub fn new(config: StripeConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Create a client sharing an existing `reqwest::Client`
    pub fn with_http_client(http: reqwest::Client, config: StripeConfig) -> Self {
        Self { http, config }
    }

    /// Form parameters for a session tagged with `identity`
    pub fn session_params(&self, identity: &Identity) -> Vec<(String, String)> {
        let item = "line_items[0]";
        vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            (
                format!("{item}[price_data][currency]"),
                UNLOCK_SKU.currency.into(),
            ),
            (
                format!("{item}[price_data][product_data][name]"),
                UNLOCK_SKU.name.into(),
            ),
            (
                format!("{item}[price_data][product_data][description]"),
                UNLOCK_SKU.description.into(),
            ),
            (
                format!("{item}[price_data][unit_amount]"),
                UNLOCK_SKU.unit_amount.to_string(),
            ),
            (format!("{item}[quantity]"), "1".into()),
            ("success_url".into(), self.config.success_url.clone()),
            ("cancel_url".into(), self.config.cancel_url.clone()),
            (
                format!("metadata[{IDENTITY_METADATA_KEY}]"),
                identity.as_str().to_string(),
            ),
        ]
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl CheckoutProvider for StripeCheckoutClient {
    async fn create_session(&self, identity: &Identity) -> Result<CheckoutRedirect, ProviderError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.secret_key)
            .form(&self.session_params(identity))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope
                    .error
                    .message
                    .or(envelope.error.kind)
                    .unwrap_or_else(|| status.to_string()),
                Err(_) => status.to_string(),
            };
            tracing::warn!(status = status.as_u16(), error = %message, "Checkout session creation failed");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let url = session.url.ok_or_else(|| {
            ProviderError::InvalidResponse(format!("session {} has no url", session.id))
        })?;

        tracing::info!(session_id = %session.id, identity = %identity, "Checkout session created");
        Ok(CheckoutRedirect {
            session_id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_params_single_fixed_line_item() {
        let client = StripeCheckoutClient::new(StripeConfig::test_config());
        let params = client.session_params(&Identity::from("203.0.113.9"));

        assert_eq!(param(&params, "mode"), Some("payment"));
        assert_eq!(
            param(&params, "line_items[0][price_data][currency]"),
            Some("gbp")
        );
        assert_eq!(
            param(&params, "line_items[0][price_data][unit_amount]"),
            Some("799")
        );
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("1"));
        assert_eq!(param(&params, "metadata[user_ip]"), Some("203.0.113.9"));
        assert!(param(&params, "line_items[1][quantity]").is_none());
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let mut config = StripeConfig::test_config();
        config.api_base = "http://127.0.0.1:9999/".into();
        let client = StripeCheckoutClient::new(config);
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:9999/v1/checkout/sessions"
        );
    }
}
