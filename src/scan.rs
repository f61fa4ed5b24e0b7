//! Scan orchestration
//!
//! Runs one admitted scan end to end: validate the URL, take a rendering
//! slot, open an isolated session, navigate under a hard deadline, audit,
//! and release the session on every path.
//!
//! ```text
//! url ──> validate ──> slot (Semaphore) ──> launch ──> navigate ──> audit
//!                                              │                      │
//!                                              └──────── close <──────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::browser::audit::AuditReport;
use crate::browser::navigation::UrlValidator;
use crate::error::{AuditError, BrowserError, NavigationError, ScanError};
use crate::metrics::global_metrics;

/// Produces isolated rendering sessions
#[async_trait]
pub trait RenderingEngine: Send + Sync + 'static {
    /// Start a fresh session with no state shared with any other
    async fn launch(&self) -> Result<Box<dyn RenderSession>, BrowserError>;
}

/// One live rendering session
#[async_trait]
pub trait RenderSession: Send {
    /// Load `url`, giving up after `timeout`
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), NavigationError>;

    /// Run the accessibility audit on the loaded document
    async fn audit(&mut self) -> Result<AuditReport, AuditError>;

    /// Release every resource held by the session
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Scan limits
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Hard ceiling on page load (default: 20s)
    pub navigation_timeout: Duration,
    /// Hard ceiling on the audit run (default: 30s)
    pub audit_timeout: Duration,
    /// Sessions allowed open at once (default: 2)
    pub max_concurrent: usize,
    /// How long a scan waits for a free slot (default: 30s)
    pub queue_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(20),
            audit_timeout: Duration::from_secs(30),
            max_concurrent: 2,
            queue_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs scans against a [`RenderingEngine`]
pub struct ScanOrchestrator {
    engine: Arc<dyn RenderingEngine>,
    permits: Arc<Semaphore>,
    config: ScanConfig,
}

impl ScanOrchestrator {
    /// Create an orchestrator; `max_concurrent` is clamped to at least one
    pub fn new(engine: Arc<dyn RenderingEngine>, config: ScanConfig) -> Self {
        let slots = config.max_concurrent.max(1);
        Self {
            engine,
            permits: Arc::new(Semaphore::new(slots)),
            config,
        }
    }

    /// Active limits
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Free rendering slots right now
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Scan `url` and return the audit report.
    ///
    /// A missing or unusable URL fails before any session is opened. Once a
    /// session is open it is closed whether the scan succeeds or not.
    #[instrument(skip(self))]
    pub async fn scan(&self, url: Option<&str>) -> Result<AuditReport, ScanError> {
        let result = self.run(url).await;
        match &result {
            Ok(_) => {}
            Err(e) if e.is_client_error() => {}
            Err(e) => {
                global_metrics().record_scan_failure(e.kind());
                error!(error = %e, kind = e.kind(), "Scan failed");
            }
        }
        result
    }

    /// Run [`scan`](Self::scan) on its own task so a dropped request does not
    /// cancel the scan midway and strand its session.
    pub async fn scan_detached(
        self: &Arc<Self>,
        url: Option<String>,
    ) -> Result<AuditReport, ScanError> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.scan(url.as_deref()).await }).await?
    }

    async fn run(&self, url: Option<&str>) -> Result<AuditReport, ScanError> {
        let raw = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ScanError::MissingUrl)?;
        let target = UrlValidator::validate(raw).map_err(ScanError::InvalidUrl)?;

        let queue_ms = self.config.queue_timeout.as_millis() as u64;
        let _permit = tokio::time::timeout(
            self.config.queue_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        .map_err(|_| ScanError::Busy(queue_ms))?
        .map_err(|e| ScanError::Aborted(e.to_string()))?;

        let start = Instant::now();
        let mut session = self.engine.launch().await?;
        global_metrics().inc_active_sessions();

        let outcome = self.navigate_and_audit(session.as_mut(), &target).await;

        let closed = session.close().await;
        global_metrics().dec_active_sessions();

        match (outcome, closed) {
            (Ok(report), Ok(())) => {
                let elapsed = start.elapsed();
                global_metrics().record_scan(elapsed);
                info!(
                    violations = report.violations.len(),
                    by_impact = ?report.count_by_impact(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Scan complete"
                );
                Ok(report)
            }
            (Ok(report), Err(close_err)) => {
                warn!(error = %close_err, "Scan succeeded but session did not close cleanly");
                global_metrics().record_scan(start.elapsed());
                Ok(report)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Session did not close cleanly after failed scan");
                Err(e)
            }
        }
    }

    async fn navigate_and_audit(
        &self,
        session: &mut dyn RenderSession,
        target: &Url,
    ) -> Result<AuditReport, ScanError> {
        let nav_timeout = self.config.navigation_timeout;
        tokio::time::timeout(nav_timeout, session.navigate(target, nav_timeout))
            .await
            .map_err(|_| NavigationError::Timeout(nav_timeout.as_millis() as u64))??;

        let audit_timeout = self.config.audit_timeout;
        let report = tokio::time::timeout(audit_timeout, session.audit())
            .await
            .map_err(|_| AuditError::Timeout(audit_timeout.as_millis() as u64))??;

        Ok(report)
    }
}
