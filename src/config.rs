//! Application configuration
//!
//! Everything secret or deployment-specific comes from the environment
//! (optionally seeded from a `.env` file). Process-level knobs such as the
//! listen address live on the command line.

use std::env;

use chrono::Duration;

use crate::browser::audit::AxeLocation;
use crate::cors::parse_origin_list;
use crate::error::ConfigError;
use crate::quota::QuotaConfig;
use crate::stripe::config::non_empty;
use crate::stripe::StripeConfig;

/// Environment-derived settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Payment provider credentials and redirects
    pub stripe: StripeConfig,
    /// Free-tier window
    pub quota: QuotaConfig,
    /// Where the audit engine is read from at startup
    pub axe: AxeLocation,
    /// Allowed browser origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    /// Load from environment variables
    ///
    /// # Environment Variables
    ///
    /// - Stripe variables, see [`StripeConfig::from_env`]
    /// - `QUOTA_WINDOW_SECS` (default 86400), `QUOTA_MAX` (default 1)
    /// - `AXE_CORE_PATH`: local `axe.min.js`
    /// - `AXE_CORE_URL`: downloaded once at startup when no path is set
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stripe = StripeConfig::from_lookup(&lookup)?;

        let defaults = QuotaConfig::default();
        let window = match parse_var::<i64, _>(&lookup, "QUOTA_WINDOW_SECS")? {
            Some(secs) => Duration::try_seconds(secs)
                .filter(|d| *d > Duration::zero())
                .ok_or_else(|| ConfigError::InvalidVar {
                    name: "QUOTA_WINDOW_SECS",
                    reason: format!("{secs} is not a usable window length"),
                })?,
            None => defaults.window,
        };
        let quota = QuotaConfig {
            window,
            max: parse_var(&lookup, "QUOTA_MAX")?.unwrap_or(defaults.max),
        };

        let axe = if let Some(path) = non_empty(&lookup, "AXE_CORE_PATH") {
            AxeLocation::File(path.into())
        } else if let Some(raw) = non_empty(&lookup, "AXE_CORE_URL") {
            let parsed = url::Url::parse(&raw).map_err(|e| ConfigError::InvalidVar {
                name: "AXE_CORE_URL",
                reason: e.to_string(),
            })?;
            AxeLocation::Url(parsed.into())
        } else {
            AxeLocation::default()
        };

        let cors_origins = non_empty(&lookup, "CORS_ALLOWED_ORIGINS")
            .map(|raw| parse_origin_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            stripe,
            quota,
            axe,
            cors_origins,
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidVar {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
