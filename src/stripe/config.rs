//! Stripe configuration
//!
//! Secrets come from the environment only; nothing sensitive is hardcoded or
//! logged.

use std::env;
use std::fmt;

use chrono::Duration;

use crate::error::ConfigError;

/// Default Stripe REST endpoint
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Default redirect after a completed checkout
pub const DEFAULT_SUCCESS_URL: &str =
    "https://accessibility-scanner-frontend.vercel.app/?token={CHECKOUT_SESSION_ID}";

/// Default redirect after an abandoned checkout
pub const DEFAULT_CANCEL_URL: &str = "https://accessibility-scanner-frontend.vercel.app/";

/// Default replay tolerance for signed webhook timestamps
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Stripe credentials and redirect targets
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: String,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: String,
    /// Redirect after payment
    pub success_url: String,
    /// Redirect after cancellation
    pub cancel_url: String,
    /// API base URL, overridable for testing
    pub api_base: String,
    /// Maximum accepted age of a signed webhook timestamp
    pub signature_tolerance: Duration,
}

impl StripeConfig {
    /// Load from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `STRIPE_SECRET_KEY` (required)
    /// - `STRIPE_WEBHOOK_SECRET` (required)
    /// - `CHECKOUT_SUCCESS_URL`, `CHECKOUT_CANCEL_URL` (optional)
    /// - `STRIPE_API_BASE` (optional)
    /// - `STRIPE_WEBHOOK_TOLERANCE_SECS` (optional, default 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = required(&lookup, "STRIPE_SECRET_KEY")?;
        let webhook_secret = required(&lookup, "STRIPE_WEBHOOK_SECRET")?;

        let tolerance_secs = match non_empty(&lookup, "STRIPE_WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw.parse::<i64>().map_err(|e| ConfigError::InvalidVar {
                name: "STRIPE_WEBHOOK_TOLERANCE_SECS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_TOLERANCE_SECS,
        };
        let signature_tolerance = Duration::try_seconds(tolerance_secs)
            .filter(|d| *d >= Duration::zero())
            .ok_or_else(|| ConfigError::InvalidVar {
                name: "STRIPE_WEBHOOK_TOLERANCE_SECS",
                reason: format!("{tolerance_secs} is out of range"),
            })?;

        let optional = |name: &str, default: &str| {
            non_empty(&lookup, name).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            secret_key,
            webhook_secret,
            success_url: optional("CHECKOUT_SUCCESS_URL", DEFAULT_SUCCESS_URL),
            cancel_url: optional("CHECKOUT_CANCEL_URL", DEFAULT_CANCEL_URL),
            api_base: optional("STRIPE_API_BASE", DEFAULT_API_BASE),
            signature_tolerance,
        })
    }

    /// Create a test configuration
    pub fn test_config() -> Self {
        Self {
            secret_key: "sk_test_xxx".to_string(),
            webhook_secret: "whsec_test123secret456".to_string(),
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            cancel_url: DEFAULT_CANCEL_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            signature_tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
        }
    }
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .field("api_base", &self.api_base)
            .field("signature_tolerance", &self.signature_tolerance)
            .finish()
    }
}

pub(crate) fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name).ok_or(ConfigError::MissingVar(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", StripeConfig::test_config());
        assert!(!rendered.contains("sk_test_xxx"));
        assert!(!rendered.contains("whsec_"));
        assert!(rendered.contains("<redacted>"));
    }

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_from_lookup_requires_secrets() {
        let err = StripeConfig::from_lookup(lookup(&[("STRIPE_SECRET_KEY", "sk_test_1")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("STRIPE_WEBHOOK_SECRET")));

        let err = StripeConfig::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "  "),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("STRIPE_SECRET_KEY")));
    }

    #[test]
    fn test_from_lookup_defaults_and_overrides() {
        let config = StripeConfig::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
            ("STRIPE_API_BASE", "http://127.0.0.1:12111"),
        ]))
        .unwrap();
        assert_eq!(config.api_base, "http://127.0.0.1:12111");
        assert_eq!(config.success_url, DEFAULT_SUCCESS_URL);
        assert_eq!(config.signature_tolerance, Duration::seconds(300));
    }

    #[test]
    fn test_from_lookup_rejects_bad_tolerance() {
        let err = StripeConfig::from_lookup(lookup(&[
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
            ("STRIPE_WEBHOOK_TOLERANCE_SECS", "five"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "STRIPE_WEBHOOK_TOLERANCE_SECS", .. }));
    }
}
