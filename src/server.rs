//! HTTP surface
//!
//! ```text
//! POST /webhook                  ──> WebhookVerifier ──> EntitlementStore
//! POST /scan                     ──> QuotaGate ──> ScanOrchestrator
//! POST /create-checkout-session  ──> CheckoutProvider
//! GET  /health, /status, /metrics
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::entitlement::{EntitlementStore, InMemoryEntitlementStore};
use crate::handlers::{
    checkout_handler, health_handler, metrics_handler, scan_handler, status_handler,
    webhook_handler,
};
use crate::quota::QuotaGate;
use crate::scan::{RenderingEngine, ScanConfig, ScanOrchestrator};
use crate::stripe::{CheckoutProvider, StripeCheckoutClient, WebhookVerifier};

/// Shared state behind every route
pub struct AppState {
    /// Paid unlocks, written by the webhook and read by the quota gate
    pub entitlements: Arc<dyn EntitlementStore>,
    /// Free-tier admission
    pub quota: QuotaGate,
    /// Scan pipeline
    pub scanner: Arc<ScanOrchestrator>,
    /// Payment provider
    pub checkout: Arc<dyn CheckoutProvider>,
    /// Webhook authentication and processing
    pub webhook: WebhookVerifier,
}

impl AppState {
    /// Wire up production state: in-memory entitlements, Stripe checkout
    pub fn from_config(
        config: &AppConfig,
        engine: Arc<dyn RenderingEngine>,
        scan: ScanConfig,
    ) -> Self {
        let entitlements: Arc<dyn EntitlementStore> = Arc::new(InMemoryEntitlementStore::new());
        Self {
            quota: QuotaGate::new(config.quota, Arc::clone(&entitlements)),
            scanner: Arc::new(ScanOrchestrator::new(engine, scan)),
            checkout: Arc::new(StripeCheckoutClient::new(config.stripe.clone())),
            webhook: WebhookVerifier::from_config(&config.stripe, Arc::clone(&entitlements)),
            entitlements,
        }
    }
}

/// All routes, without middleware
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/scan", post(scan_handler))
        .route("/create-checkout-session", post(checkout_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Routes plus CORS
pub fn app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    router(state).layer(cors)
}

/// Periodically drop lapsed entitlements and elapsed quota windows
pub fn spawn_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let entitlements = state.entitlements.sweep(now).await;
            let windows = state.quota.sweep(now);
            debug!(entitlements, windows, "Swept expired state");
        }
    })
}

/// Serve `app` on `addr` until Ctrl-C
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
