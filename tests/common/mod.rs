//! Shared test doubles: a scripted rendering engine, a canned payment
//! provider, and helpers for signed webhook deliveries.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use url::Url;

use a11y_gate::browser::AuditReport;
use a11y_gate::error::{AuditError, BrowserError, NavigationError};
use a11y_gate::identity::Identity;
use a11y_gate::scan::{RenderSession, RenderingEngine};
use a11y_gate::stripe::{CheckoutProvider, CheckoutRedirect, ProviderError, SignatureVerifier};

pub const WEBHOOK_SECRET: &str = "whsec_test123secret456";

/// Fixed reference instant
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn sample_report(url: &str) -> AuditReport {
    AuditReport::from_json(
        &json!({
            "testEngine": {"name": "axe-core", "version": "4.10.2"},
            "url": url,
            "timestamp": "2026-01-01T00:00:00.000Z",
            "violations": [{
                "id": "image-alt",
                "impact": "critical",
                "description": "Ensures <img> elements have alternate text",
                "help": "Images must have alternate text",
                "helpUrl": "https://dequeuniversity.com/rules/axe/4.10/image-alt",
                "tags": ["wcag2a"],
                "nodes": [{"html": "<img src=\"a.png\">", "target": ["img"]}]
            }],
            "passes": [],
            "incomplete": [],
            "inapplicable": []
        })
        .to_string(),
    )
    .unwrap()
}

/// What each fake session does
#[derive(Debug, Clone, Default)]
pub enum Script {
    #[default]
    Succeed,
    FailLaunch,
    FailNavigation,
    HangNavigation,
    FailAudit,
    FailClose,
    SlowNavigation(Duration),
}

#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub live: AtomicUsize,
    pub peak_live: AtomicUsize,
    pub navigated: Mutex<Vec<String>>,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn peak_live(&self) -> usize {
        self.peak_live.load(Ordering::SeqCst)
    }
}

/// Rendering engine that follows a [`Script`] instead of launching a browser
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub script: Script,
    pub counters: Arc<Counters>,
}

impl FakeEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            counters: Arc::default(),
        }
    }
}

#[async_trait]
impl RenderingEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, BrowserError> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        if matches!(self.script, Script::FailLaunch) {
            return Err(BrowserError::LaunchFailed("no chromium here".into()));
        }
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
            url: None,
        }))
    }
}

struct FakeSession {
    script: Script,
    counters: Arc<Counters>,
    url: Option<Url>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &Url, _timeout: Duration) -> Result<(), NavigationError> {
        self.counters.navigated.lock().push(url.to_string());
        match &self.script {
            Script::FailNavigation => {
                return Err(NavigationError::LoadFailed("net::ERR_NAME_NOT_RESOLVED".into()))
            }
            Script::HangNavigation => std::future::pending::<()>().await,
            Script::SlowNavigation(delay) => tokio::time::sleep(*delay).await,
            _ => {}
        }
        self.url = Some(url.clone());
        Ok(())
    }

    async fn audit(&mut self) -> Result<AuditReport, AuditError> {
        if matches!(self.script, Script::FailAudit) {
            return Err(AuditError::ExecutionFailed("axe is not defined".into()));
        }
        let url = self.url.as_ref().map(Url::as_str).unwrap_or_default();
        Ok(sample_report(url))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        if matches!(self.script, Script::FailClose) {
            return Err(BrowserError::CloseFailed("already gone".into()));
        }
        Ok(())
    }
}

/// Payment provider returning a canned result
#[derive(Default)]
pub struct FakeCheckout {
    pub fail_with: Option<String>,
    pub seen: Mutex<Vec<Identity>>,
}

#[async_trait]
impl CheckoutProvider for FakeCheckout {
    async fn create_session(&self, identity: &Identity) -> Result<CheckoutRedirect, ProviderError> {
        self.seen.lock().push(identity.clone());
        match &self.fail_with {
            Some(message) => Err(ProviderError::Api {
                status: 401,
                message: message.clone(),
            }),
            None => Ok(CheckoutRedirect {
                session_id: "cs_test_1".into(),
                url: "https://checkout.stripe.com/c/pay/cs_test_1".into(),
            }),
        }
    }
}

pub fn signer() -> SignatureVerifier {
    SignatureVerifier::new(WEBHOOK_SECRET, chrono::Duration::seconds(300))
}

/// `checkout.session.completed` body; `identity: None` omits the metadata key
pub fn completed_checkout(identity: Option<&str>) -> Vec<u8> {
    let metadata = match identity {
        Some(ip) => json!({ "user_ip": ip }),
        None => json!({}),
    };
    json!({
        "id": "evt_test_completed",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "livemode": false,
        "data": {
            "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_status": "paid",
                "amount_total": 799,
                "currency": "gbp",
                "metadata": metadata
            }
        }
    })
    .to_string()
    .into_bytes()
}

pub fn event_of_type(event_type: &str) -> Vec<u8> {
    json!({
        "id": "evt_test_other",
        "type": event_type,
        "data": { "object": { "id": "obj_1" } }
    })
    .to_string()
    .into_bytes()
}
