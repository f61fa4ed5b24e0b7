//! Free-tier quota gate
//!
//! Per-identity, lazily initialised fixed window: the first request from an
//! identity opens a window of `window` length, at most `max` requests are
//! admitted inside it, and the window restarts on the first request after it
//! elapses. Bursts straddling a window boundary are accepted behavior.
//!
//! An active entitlement bypasses the counter entirely: it neither consumes a
//! slot nor resets the window.
//!
//! The entitlement lookup and the counter update are two separate steps, so
//! two requests for the same identity racing through the gate can be slightly
//! over-admitted. Exact atomicity is not promised.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::entitlement::EntitlementStore;
use crate::identity::Identity;

/// Advisory message returned once the free allotment is spent
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "Free scan limit reached. Please upgrade for unlimited scans.";

/// Quota window configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Length of one window
    pub window: Duration,
    /// Requests admitted per identity per window
    pub max: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            max: 1,
        }
    }
}

/// Why a request was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum AdmitBasis {
    /// Paid unlock is active; the counter was not touched
    Entitled {
        /// When the unlock lapses
        until: DateTime<Utc>,
    },
    /// Counted against the free allotment
    Free {
        /// Free requests left in the current window
        remaining: u32,
    },
}

/// Outcome of [`QuotaGate::admit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Request may proceed
    Allowed(AdmitBasis),
    /// Free allotment exhausted for the current window
    Denied {
        /// Human-readable advisory; no precise retry time is promised
        message: &'static str,
        /// Configured per-window limit
        limit: u32,
    },
}

impl Admission {
    /// Check if the request was admitted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct QuotaWindow {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Decision point combining the fixed-window counter with entitlement lookups
pub struct QuotaGate {
    config: QuotaConfig,
    entitlements: Arc<dyn EntitlementStore>,
    windows: Mutex<HashMap<Identity, QuotaWindow>>,
}

impl QuotaGate {
    /// Create a gate reading entitlements from `entitlements`
    pub fn new(config: QuotaConfig, entitlements: Arc<dyn EntitlementStore>) -> Self {
        Self {
            config,
            entitlements,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Quota configuration in effect
    pub fn config(&self) -> QuotaConfig {
        self.config
    }

    /// Decide whether `identity` may run a scan at `now`
    pub async fn admit(&self, identity: &Identity, now: DateTime<Utc>) -> Admission {
        if let Some(until) = self.entitlements.expires_at(identity).await {
            if until > now {
                debug!(identity = %identity, until = %until, "Admitted by entitlement");
                return Admission::Allowed(AdmitBasis::Entitled { until });
            }
        }

        let mut windows = self.windows.lock();
        let window = windows.entry(identity.clone()).or_insert(QuotaWindow {
            started_at: now,
            count: 0,
        });

        if now - window.started_at >= self.config.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count < self.config.max {
            window.count += 1;
            let remaining = self.config.max - window.count;
            debug!(identity = %identity, remaining, "Admitted on free quota");
            Admission::Allowed(AdmitBasis::Free { remaining })
        } else {
            info!(identity = %identity, limit = self.config.max, "Free quota exhausted");
            Admission::Denied {
                message: QUOTA_EXCEEDED_MESSAGE,
                limit: self.config.max,
            }
        }
    }

    /// Requests counted so far in the identity's current window, if one is open
    pub fn used(&self, identity: &Identity) -> Option<u32> {
        self.windows.lock().get(identity).map(|w| w.count)
    }

    /// Drop windows that have fully elapsed at `now`; returns how many were removed.
    ///
    /// A dropped window is indistinguishable from an elapsed one, so this only
    /// bounds memory.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let window = self.config.window;
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now - w.started_at < window);
        before - windows.len()
    }

    /// Number of identities with an open window
    pub fn tracked(&self) -> usize {
        self.windows.lock().len()
    }
}
