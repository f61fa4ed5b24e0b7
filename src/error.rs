//! Error types for the accessibility scan gateway
//!
//! Every failure is isolated to the request that produced it; nothing here is
//! fatal to the process and nothing is retried automatically. [`Error`]
//! implements [`IntoResponse`] so handlers can return it directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::quota::QUOTA_EXCEEDED_MESSAGE;
use crate::stripe::{ProviderError, StripeWebhookError};

/// Message returned when `/scan` is called without a URL
pub const MISSING_URL_MESSAGE: &str = "No URL provided.";

/// The main error type for gateway operations
#[derive(Error, Debug)]
pub enum Error {
    /// Scan path failures (input, session, navigation, audit)
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Webhook authentication or payload failures
    #[error(transparent)]
    Webhook(#[from] StripeWebhookError),

    /// Payment provider failures while creating a checkout session
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Free allotment exhausted
    #[error("{0}")]
    QuotaExceeded(&'static str),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scan request failures
#[derive(Error, Debug)]
pub enum ScanError {
    /// No URL in the request
    #[error("No URL provided.")]
    MissingUrl,

    /// URL present but not navigable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// All rendering slots stayed busy for the whole queue timeout
    #[error("Scanner is busy, timed out after {0}ms waiting for a free slot")]
    Busy(u64),

    /// Rendering session could not be acquired or released
    #[error("Session error: {0}")]
    Session(#[from] BrowserError),

    /// Target page failed to load
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// Audit engine failed against the rendered page
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    /// Scan task ended without producing a result
    #[error("Scan aborted: {0}")]
    Aborted(String),
}

impl ScanError {
    /// Whether the caller sent a bad request (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScanError::MissingUrl | ScanError::InvalidUrl(_))
    }

    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::MissingUrl => "missing_url",
            ScanError::InvalidUrl(_) => "invalid_url",
            ScanError::Busy(_) => "busy",
            ScanError::Session(_) => "session",
            ScanError::Navigation(_) => "navigation",
            ScanError::Audit(_) => "audit",
            ScanError::Aborted(_) => "aborted",
        }
    }
}

/// Browser lifecycle and control errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create new page/tab
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Browser did not shut down cleanly
    #[error("Failed to close browser: {0}")]
    CloseFailed(String),
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Navigation timeout
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),
}

/// Accessibility audit errors
#[derive(Error, Debug)]
pub enum AuditError {
    /// Audit engine source could not be loaded or injected
    #[error("Failed to inject audit engine: {0}")]
    InjectionFailed(String),

    /// Audit run threw inside the page
    #[error("Audit execution failed: {0}")]
    ExecutionFailed(String),

    /// Audit returned something we could not parse
    #[error("Invalid audit result: {0}")]
    InvalidResult(String),

    /// Audit did not finish in time
    #[error("Audit timed out after {0}ms")]
    Timeout(u64),
}

/// Startup configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing or empty
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),

    /// Environment variable present but unusable
    #[error("Invalid value for {name}: {reason}")]
    InvalidVar {
        /// Variable name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Scan(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Error::Scan(ScanError::Busy(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Scan(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Webhook(_) => StatusCode::BAD_REQUEST,
            Error::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Provider(_) | Error::Config(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Quota denial with the standard advisory message
    pub fn quota_exceeded() -> Self {
        Error::QuotaExceeded(QUOTA_EXCEEDED_MESSAGE)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            // Payment provider reads the body as text
            Error::Webhook(e) => (status, format!("Webhook Error: {e}")).into_response(),
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

/// Convert chromiumoxide errors raised while driving a page
impl From<chromiumoxide::error::CdpError> for NavigationError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        NavigationError::LoadFailed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(err: tokio::task::JoinError) -> Self {
        ScanError::Aborted(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_is_client_error() {
        let err = Error::from(ScanError::MissingUrl);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), MISSING_URL_MESSAGE);
    }

    #[test]
    fn test_navigation_timeout_is_server_error() {
        let err = Error::from(ScanError::Navigation(NavigationError::Timeout(20000)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("20000ms"));
    }

    #[test]
    fn test_quota_exceeded_status() {
        let err = Error::quota_exceeded();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), QUOTA_EXCEEDED_MESSAGE);
    }

    #[test]
    fn test_busy_is_unavailable() {
        let err = Error::from(ScanError::Busy(30000));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_webhook_error_is_bad_request() {
        let err = Error::from(StripeWebhookError::MissingSignature);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingVar("STRIPE_SECRET_KEY");
        assert_eq!(err.to_string(), "STRIPE_SECRET_KEY environment variable not set");
    }
}
