//! Status and health check handlers.
//!
//! - `/health` - Liveness probe
//! - `/status` - Gateway state: scan slots, quota windows, entitlements
//! - `/metrics` - Prometheus text exposition
//!
//! # Example Response
//!
//! ```json
//! {
//!   "name": "a11y-gate",
//!   "version": "0.1.0",
//!   "status": "running",
//!   "uptime_seconds": 3600,
//!   "timestamp": "2026-01-01T12:00:00+00:00",
//!   "scans": {
//!     "completed": 42,
//!     "failed": 3,
//!     "active_sessions": 1,
//!     "available_slots": 1,
//!     "max_concurrent": 2,
//!     "p50_ms": 5400
//!   },
//!   "quota": { "window_secs": 86400, "max": 1, "tracked_identities": 17 },
//!   "entitlements": { "stored": 2 }
//! }
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::metrics::global_metrics;
use crate::server::AppState;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Health check response for simple liveness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (always "healthy" if responding)
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Detailed gateway status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Always "running" if responding
    pub status: String,
    /// Seconds since the metrics collector started
    pub uptime_seconds: u64,
    /// When this status was generated (RFC 3339)
    pub timestamp: String,
    /// Scan pipeline counters
    pub scans: ScanStats,
    /// Free-tier gate state
    pub quota: QuotaStats,
    /// Entitlement store state
    pub entitlements: EntitlementStats,
}

/// Scan pipeline counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Scans that returned findings
    pub completed: u64,
    /// Scans that failed after admission
    pub failed: u64,
    /// Rendering sessions open right now
    pub active_sessions: u64,
    /// Rendering slots free right now
    pub available_slots: usize,
    /// Configured concurrency ceiling
    pub max_concurrent: usize,
    /// Median scan duration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50_ms: Option<u64>,
}

/// Free-tier gate state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaStats {
    /// Window length in seconds
    pub window_secs: i64,
    /// Free scans per window
    pub max: u32,
    /// Identities with an open window
    pub tracked_identities: usize,
}

/// Entitlement store state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementStats {
    /// Records held, including lapsed ones not yet swept
    pub stored: usize,
}

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let metrics = global_metrics();
    let quota = state.quota.config();

    let response = StatusResponse {
        name: SERVER_NAME.to_string(),
        version: SERVER_VERSION.to_string(),
        status: "running".to_string(),
        uptime_seconds: metrics.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        scans: ScanStats {
            completed: metrics.scans_total.load(Ordering::Relaxed),
            failed: metrics.scan_failures_total.load(Ordering::Relaxed),
            active_sessions: metrics.active_sessions.load(Ordering::Relaxed),
            available_slots: state.scanner.available_slots(),
            max_concurrent: state.scanner.config().max_concurrent,
            p50_ms: metrics.scan_p50().map(|d| d.as_millis() as u64),
        },
        quota: QuotaStats {
            window_secs: quota.window.num_seconds(),
            max: quota.max,
            tracked_identities: state.quota.tracked(),
        },
        entitlements: EntitlementStats {
            stored: state.entitlements.len().await,
        },
    };

    (StatusCode::OK, Json(response))
}

/// `GET /metrics`
#[instrument(skip_all)]
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        global_metrics().to_prometheus_format(),
    )
}
