//! Metrics collection for gateway observability
//!
//! - Atomic counters for scans, quota denials, webhooks and grants
//! - Gauge of live rendering sessions
//! - Ring buffer of scan durations for percentiles
//! - Prometheus text format export (served on `/metrics`)
//!
//! # Example
//!
//! ```rust,no_run
//! use a11y_gate::metrics::global_metrics;
//! use std::time::Duration;
//!
//! global_metrics().record_scan(Duration::from_millis(4200));
//! let output = global_metrics().to_prometheus_format();
//! ```

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::{Duration, Instant};

/// Maximum number of duration samples to keep
const MAX_HISTOGRAM_SAMPLES: usize = 1000;

/// Gateway metrics. Thread-safe; counters are lock-free.
#[derive(Debug)]
pub struct Metrics {
    /// Completed scans
    pub scans_total: AtomicU64,
    /// Failed scans (any error after admission)
    pub scan_failures_total: AtomicU64,
    /// Requests rejected by the quota gate
    pub quota_denials_total: AtomicU64,
    /// Webhook deliveries received
    pub webhooks_total: AtomicU64,
    /// Webhook deliveries rejected at verification or parsing
    pub webhook_rejections_total: AtomicU64,
    /// Entitlements written
    pub entitlements_granted_total: AtomicU64,
    /// Completed checkouts with no identity metadata
    pub unattributed_checkouts_total: AtomicU64,
    /// Checkout sessions created
    pub checkout_sessions_total: AtomicU64,
    /// Rendering sessions currently open
    pub active_sessions: AtomicU64,

    scan_durations: RwLock<RingBuffer<Duration>>,
    scan_failures_by_kind: RwLock<HashMap<&'static str, u64>>,
    start_time: Instant,
}

#[derive(Debug)]
struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T: Clone + Ord> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
        }
    }

    fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.write_pos] = value;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    /// Percentile (0.0 to 1.0)
    fn percentile(&self, p: f64) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let mut sorted = self.data.clone();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).cloned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            scans_total: AtomicU64::new(0),
            scan_failures_total: AtomicU64::new(0),
            quota_denials_total: AtomicU64::new(0),
            webhooks_total: AtomicU64::new(0),
            webhook_rejections_total: AtomicU64::new(0),
            entitlements_granted_total: AtomicU64::new(0),
            unattributed_checkouts_total: AtomicU64::new(0),
            checkout_sessions_total: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            scan_durations: RwLock::new(RingBuffer::new(MAX_HISTOGRAM_SAMPLES)),
            scan_failures_by_kind: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successful scan and how long it took
    pub fn record_scan(&self, duration: Duration) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut durations) = self.scan_durations.write() {
            durations.push(duration);
        }
    }

    /// Record a failed scan
    pub fn record_scan_failure(&self, kind: &'static str) {
        self.scan_failures_total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut breakdown) = self.scan_failures_by_kind.write() {
            *breakdown.entry(kind).or_insert(0) += 1;
        }
    }

    /// Record a quota denial
    pub fn record_quota_denial(&self) {
        self.quota_denials_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound webhook delivery
    pub fn record_webhook(&self) {
        self.webhooks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected webhook delivery
    pub fn record_webhook_rejection(&self) {
        self.webhook_rejections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entitlement grant
    pub fn record_grant(&self) {
        self.entitlements_granted_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed checkout that could not be attributed
    pub fn record_unattributed_checkout(&self) {
        self.unattributed_checkouts_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a created checkout session
    pub fn record_checkout_session(&self) {
        self.checkout_sessions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a rendering session as opened
    pub fn inc_active_sessions(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a rendering session as released
    pub fn dec_active_sessions(&self) {
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Seconds since this collector was created
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Median scan duration, if any scans completed
    pub fn scan_p50(&self) -> Option<Duration> {
        self.scan_durations.read().ok()?.percentile(0.5)
    }

    /// Convert metrics to Prometheus text format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("a11y_gate_scans_total", &self.scans_total),
            ("a11y_gate_scan_failures_total", &self.scan_failures_total),
            ("a11y_gate_quota_denials_total", &self.quota_denials_total),
            ("a11y_gate_webhooks_total", &self.webhooks_total),
            (
                "a11y_gate_webhook_rejections_total",
                &self.webhook_rejections_total,
            ),
            (
                "a11y_gate_entitlements_granted_total",
                &self.entitlements_granted_total,
            ),
            (
                "a11y_gate_unattributed_checkouts_total",
                &self.unattributed_checkouts_total,
            ),
            (
                "a11y_gate_checkout_sessions_total",
                &self.checkout_sessions_total,
            ),
            ("a11y_gate_active_sessions", &self.active_sessions),
        ];
        for (name, value) in counters {
            let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
        }

        if let Ok(breakdown) = self.scan_failures_by_kind.read() {
            let mut kinds: Vec<_> = breakdown.iter().collect();
            kinds.sort();
            for (kind, count) in kinds {
                let _ = writeln!(
                    output,
                    "a11y_gate_scan_failures_by_kind{{kind=\"{}\"}} {}",
                    kind, count
                );
            }
        }

        if let Ok(durations) = self.scan_durations.read() {
            for (label, p) in [("p50", 0.5), ("p95", 0.95), ("p99", 0.99)] {
                if let Some(d) = durations.percentile(p) {
                    let _ = writeln!(
                        output,
                        "a11y_gate_scan_duration_{}_ms {}",
                        label,
                        d.as_millis()
                    );
                }
            }
        }

        output
    }
}

/// Global metrics instance
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get or initialize the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
