//! CORS (Cross-Origin Resource Sharing) configuration
//!
//! The scanner frontend calls `/scan` and `/create-checkout-session` from the
//! browser, so those routes need CORS. With no configured origins every
//! origin is allowed; otherwise only the listed origins are.
//!
//! # Example
//!
//! ```rust,no_run
//! use a11y_gate::cors::cors_layer;
//!
//! let layer = cors_layer(&["https://scanner.example.com".to_string()]).unwrap();
//! ```

use http::{header::HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ConfigError;

/// Request headers the frontend may send
pub const ALLOWED_HEADERS: [http::header::HeaderName; 2] =
    [http::header::CONTENT_TYPE, http::header::AUTHORIZATION];

/// Methods the frontend may use
pub const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

/// Default max age for preflight cache (1 hour)
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Build the CORS layer for `origins`; empty means allow any origin
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    if origins.is_empty() {
        Ok(cors_layer_permissive())
    } else {
        cors_layer_with_origins(origins)
    }
}

/// Creates a permissive CORS layer that allows all origins.
pub fn cors_layer_permissive() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
}

/// Creates a CORS layer restricted to exact origins.
///
/// Origins are matched exactly (scheme, host and port), with any trailing
/// slash removed.
pub fn cors_layer_with_origins(origins: &[String]) -> Result<CorsLayer, ConfigError> {
    let values = origins
        .iter()
        .map(|o| parse_origin(o))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS)
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS)))
}

fn parse_origin(origin: &str) -> Result<HeaderValue, ConfigError> {
    let trimmed = origin.trim().trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidVar {
        name: "CORS_ALLOWED_ORIGINS",
        reason,
    };

    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(invalid(format!("{trimmed:?} is not an http(s) origin")));
    }
    HeaderValue::from_str(trimmed).map_err(|e| invalid(format!("{trimmed:?}: {e}")))
}

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
