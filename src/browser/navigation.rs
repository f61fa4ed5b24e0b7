//! Page navigation
//!
//! Loads a target URL and waits until the network is substantially idle,
//! all under a single hard deadline. Navigation is attempted once; failures
//! are reported, not retried.

use std::time::{Duration, Instant};

use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::Page;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::NavigationError;

/// Default hard ceiling on navigation, in milliseconds
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 20_000;

/// Longest URL accepted for scanning
pub const MAX_URL_LENGTH: usize = 2048;

/// Options for page navigation
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Hard deadline covering load and idle wait (default: 20000)
    pub timeout_ms: u64,
    /// Wait until condition (default: network idle)
    pub wait_until: WaitUntil,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            wait_until: WaitUntil::NetworkIdle,
        }
    }
}

/// Condition to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Wait until load event fires
    Load,
    /// Wait until DOMContentLoaded event fires
    DomContentLoaded,
    /// Wait until load, then until no resource has finished for 500ms
    NetworkIdle,
}

impl WaitUntil {
    fn script(self) -> &'static str {
        match self {
            WaitUntil::Load => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState === 'complete') {
                            resolve(true);
                        } else {
                            window.addEventListener('load', () => resolve(true));
                        }
                    })
                "#
            }
            WaitUntil::DomContentLoaded => {
                r#"
                    new Promise(resolve => {
                        if (document.readyState !== 'loading') {
                            resolve(true);
                        } else {
                            document.addEventListener('DOMContentLoaded', () => resolve(true));
                        }
                    })
                "#
            }
            WaitUntil::NetworkIdle => {
                r#"
                    new Promise(resolve => {
                        const quietMs = 500;
                        const settle = () => {
                            let seen = performance.getEntriesByType('resource').length;
                            let quietSince = Date.now();
                            const tick = () => {
                                const count = performance.getEntriesByType('resource').length;
                                if (count !== seen) {
                                    seen = count;
                                    quietSince = Date.now();
                                }
                                if (Date.now() - quietSince >= quietMs) {
                                    resolve(true);
                                } else {
                                    setTimeout(tick, 100);
                                }
                            };
                            tick();
                        };
                        if (document.readyState === 'complete') {
                            settle();
                        } else {
                            window.addEventListener('load', settle);
                        }
                    })
                "#
            }
        }
    }
}

/// Result of a navigation operation
#[derive(Debug)]
pub struct NavigationResult {
    /// Final URL after any redirects
    pub final_url: String,
    /// Page title
    pub title: Option<String>,
    /// Navigation duration in milliseconds
    pub duration_ms: u64,
}

/// URL validation utilities
pub struct UrlValidator;

impl UrlValidator {
    /// Validate a URL for scanning.
    ///
    /// Only absolute `http`/`https` URLs with a host are accepted; `file://`
    /// and friends would let callers read the server's own filesystem.
    pub fn validate(raw: &str) -> Result<Url, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("URL cannot be empty".to_string());
        }

        if raw.len() > MAX_URL_LENGTH {
            return Err(format!(
                "URL exceeds maximum length of {MAX_URL_LENGTH} characters"
            ));
        }

        let url = Url::parse(raw).map_err(|e| format!("{raw}: {e}"))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(format!("URL must use http or https, got {other}://")),
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(format!("URL has no host: {raw}"));
        }

        Ok(url)
    }
}

/// Drives a page to a target URL
pub struct PageNavigator;

impl PageNavigator {
    /// Navigate `page` to `url` and wait per `options`, bounded by `options.timeout_ms`
    #[instrument(skip(page, options), fields(url = %url))]
    pub async fn goto(
        page: &Page,
        url: &Url,
        options: &NavigationOptions,
    ) -> Result<NavigationResult, NavigationError> {
        let start = Instant::now();
        info!("Navigating");

        let deadline = Duration::from_millis(options.timeout_ms);
        let result = tokio::time::timeout(deadline, Self::navigate_once(page, url, options))
            .await
            .map_err(|_| NavigationError::Timeout(options.timeout_ms))??;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(final_url = %result.final_url, duration_ms, "Navigation complete");

        Ok(NavigationResult {
            duration_ms,
            ..result
        })
    }

    async fn navigate_once(
        page: &Page,
        url: &Url,
        options: &NavigationOptions,
    ) -> Result<NavigationResult, NavigationError> {
        page.goto(url.as_str()).await?;
        evaluate_awaited(page, options.wait_until.script(), None)
            .await
            .map_err(NavigationError::LoadFailed)?;

        let final_url = page
            .url()
            .await?
            .unwrap_or_else(|| url.to_string());
        let title = page.get_title().await.ok().flatten();

        Ok(NavigationResult {
            final_url,
            title,
            duration_ms: 0,
        })
    }
}

/// Evaluate `expression` in the page (or in `context`, when given), awaiting
/// it if it is a promise, and return the result by value
pub(crate) async fn evaluate_awaited(
    page: &Page,
    expression: impl Into<String>,
    context: Option<ExecutionContextId>,
) -> Result<Value, String> {
    let mut builder = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true);
    if let Some(context) = context {
        builder = builder.context_id(context);
    }
    let params = builder.build()?;
    let result = page
        .evaluate_expression(params)
        .await
        .map_err(|e| e.to_string())?;
    Ok(result.value().cloned().unwrap_or(Value::Null))
}
