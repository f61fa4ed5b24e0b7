//! Accessibility audit
//!
//! Injects the axe-core engine into a loaded page, runs it against the whole
//! document and parses the structured report it returns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::CreateIsolatedWorldParams;
use chromiumoxide::cdp::js_protocol::runtime::ExecutionContextId;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::browser::navigation::evaluate_awaited;
use crate::error::{AuditError, ConfigError};

/// Pinned axe-core build fetched at startup when no local copy is configured
pub const DEFAULT_AXE_CORE_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.10.2/axe.min.js";

/// Name of the isolated world the audit runs in
const AUDIT_WORLD: &str = "a11y-gate-audit";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the audit engine's JavaScript is read from at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxeLocation {
    /// Local `axe.min.js`
    File(PathBuf),
    /// Downloaded once, then held in memory
    Url(String),
}

impl Default for AxeLocation {
    fn default() -> Self {
        AxeLocation::Url(DEFAULT_AXE_CORE_URL.to_string())
    }
}

impl AxeLocation {
    /// Read or download the engine source
    pub async fn load(&self) -> Result<AxeSource, ConfigError> {
        match self {
            AxeLocation::File(path) => {
                AxeSource::from_file(path).map_err(|e| ConfigError::InvalidVar {
                    name: "AXE_CORE_PATH",
                    reason: format!("{}: {e}", path.display()),
                })
            }
            AxeLocation::Url(url) => {
                let invalid = |e: reqwest::Error| ConfigError::InvalidVar {
                    name: "AXE_CORE_URL",
                    reason: format!("{url}: {e}"),
                };
                let client = reqwest::Client::builder()
                    .timeout(FETCH_TIMEOUT)
                    .build()
                    .map_err(invalid)?;
                let source = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(invalid)?
                    .text()
                    .await
                    .map_err(invalid)?;
                info!(url = %url, bytes = source.len(), "Audit engine downloaded");
                Ok(AxeSource::new(source))
            }
        }
    }
}

/// The audit engine's JavaScript, held in memory and evaluated directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxeSource(Arc<str>);

impl AxeSource {
    /// Wrap engine source text
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self(source.into())
    }

    /// Read the engine from a local `axe.min.js`
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::new(source))
    }

    /// Length of the source in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the source is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // Evaluated at top level so the engine's globals land on `window`; the
    // completion value reports whether `axe.run` is now callable
    fn injection_script(&self) -> String {
        format!("{}\n;typeof window.axe?.run === 'function'", self.0)
    }
}

const RUN_SCRIPT: &str = "window.axe.run(document).then(r => JSON.stringify(r))";

/// Severity axe assigns to a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Minor
    Minor,
    /// Moderate
    Moderate,
    /// Serious
    Serious,
    /// Critical
    Critical,
}

/// Name and version of the engine that produced a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEngine {
    /// Engine name (`axe-core`)
    pub name: String,
    /// Engine version
    pub version: String,
}

/// One element matched by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    /// Outer HTML snippet of the element
    #[serde(default)]
    pub html: String,
    /// CSS selector path (nested arrays for iframes and shadow roots)
    #[serde(default)]
    pub target: Value,
    /// Human-readable summary of what to fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
    /// Severity for this node
    #[serde(default)]
    pub impact: Option<Impact>,
    /// Checks of which at least one must pass
    #[serde(default)]
    pub any: Vec<Value>,
    /// Checks that must all pass
    #[serde(default)]
    pub all: Vec<Value>,
    /// Checks that must all fail
    #[serde(default)]
    pub none: Vec<Value>,
}

/// One rule's outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    /// Rule identifier, e.g. `color-contrast`
    pub id: String,
    /// Worst severity across matched nodes
    #[serde(default)]
    pub impact: Option<Impact>,
    /// What the rule checks
    #[serde(default)]
    pub description: String,
    /// Short help text
    #[serde(default)]
    pub help: String,
    /// Link to the rule documentation
    #[serde(default)]
    pub help_url: String,
    /// WCAG and best-practice tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Matched elements
    #[serde(default)]
    pub nodes: Vec<NodeResult>,
}

/// Full audit report for one page, as produced by axe-core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Engine that produced the report
    #[serde(default)]
    pub test_engine: TestEngine,
    /// URL of the audited document
    #[serde(default)]
    pub url: String,
    /// When the audit ran (ISO 8601, from the page clock)
    #[serde(default)]
    pub timestamp: String,
    /// Rules that failed
    #[serde(default)]
    pub violations: Vec<RuleResult>,
    /// Rules that passed
    #[serde(default)]
    pub passes: Vec<RuleResult>,
    /// Rules that need manual review
    #[serde(default)]
    pub incomplete: Vec<RuleResult>,
    /// Rules that matched nothing on the page
    #[serde(default)]
    pub inapplicable: Vec<RuleResult>,
    /// Remaining report fields (runner, environment, options), passed through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuditReport {
    /// Parse the JSON text returned by `axe.run`
    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        serde_json::from_str(json).map_err(|e| AuditError::InvalidResult(e.to_string()))
    }

    /// Number of failing rules
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Failing rules grouped by severity
    pub fn count_by_impact(&self) -> BTreeMap<Impact, usize> {
        let mut counts = BTreeMap::new();
        for impact in self.violations.iter().filter_map(|v| v.impact) {
            *counts.entry(impact).or_insert(0) += 1;
        }
        counts
    }
}

/// Runs the audit engine against a page
pub struct AuditRunner;

impl AuditRunner {
    /// Inject `source` into an isolated world of `page` and run a
    /// full-document audit there
    ///
    /// The isolated world shares the DOM but none of the page's globals, so
    /// page scripts can neither replace the engine nor observe it.
    #[instrument(skip(page, source))]
    pub async fn run(page: &Page, source: &AxeSource) -> Result<AuditReport, AuditError> {
        let context = Self::isolated_world(page)
            .await
            .map_err(AuditError::InjectionFailed)?;

        let loaded = evaluate_awaited(page, source.injection_script(), Some(context))
            .await
            .map_err(AuditError::InjectionFailed)?;
        if loaded != Value::Bool(true) {
            return Err(AuditError::InjectionFailed(
                "axe is not defined after injection".into(),
            ));
        }
        debug!("Audit engine injected");

        let raw = evaluate_awaited(page, RUN_SCRIPT, Some(context))
            .await
            .map_err(AuditError::ExecutionFailed)?;
        let json = raw.as_str().ok_or_else(|| {
            AuditError::InvalidResult(format!("expected a JSON string, got {raw}"))
        })?;

        let report = AuditReport::from_json(json)?;
        debug!(
            violations = report.violations.len(),
            passes = report.passes.len(),
            "Audit complete"
        );
        Ok(report)
    }

    async fn isolated_world(page: &Page) -> Result<ExecutionContextId, String> {
        let frame = page
            .mainframe()
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "page has no main frame".to_string())?;
        let params = CreateIsolatedWorldParams::builder()
            .frame_id(frame)
            .world_name(AUDIT_WORLD)
            .build()?;
        let created = page.execute(params).await.map_err(|e| e.to_string())?;
        Ok(created.result.execution_context_id)
    }
}
