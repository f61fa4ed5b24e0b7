//! a11y-gate - Entitlement and Quota Gateway for Accessibility Scans
//!
//! An HTTP service in front of an on-demand web accessibility scanner. Free
//! callers get a small per-window allotment of scans; a one-off payment
//! unlocks unlimited scans for 24 hours.
//!
//! # Features
//!
//! - **Quota Gate**: per-identity fixed window, bypassed by an active unlock
//! - **Payments**: Stripe Checkout session creation and signed webhooks
//! - **Scanning**: one isolated headless Chromium per scan, audited with axe-core
//!
//! # Architecture
//!
//! ```text
//! Client ──▶ /scan ──▶ QuotaGate ──▶ ScanOrchestrator ──▶ Chromium + axe-core
//!                          │
//!                          ▼
//!                   EntitlementStore ◀── WebhookVerifier ◀── /webhook ◀── Stripe
//!                                                                          ▲
//! Client ──▶ /create-checkout-session ──▶ StripeCheckoutClient ────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use a11y_gate::browser::ChromiumEngine;
//! use a11y_gate::config::AppConfig;
//! use a11y_gate::scan::ScanConfig;
//! use a11y_gate::server::{self, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let axe = config.axe.load().await?;
//!     let engine = Arc::new(ChromiumEngine::new(Default::default(), axe));
//!     let state = Arc::new(AppState::from_config(&config, engine, ScanConfig::default()));
//!     let cors = a11y_gate::cors::cors_layer(&config.cors_origins)?;
//!     server::serve(server::app(state, cors), "0.0.0.0:4000".parse()?).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod config;
pub mod cors;
pub mod entitlement;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod quota;
pub mod scan;
pub mod server;
pub mod stripe;

// Re-exports for convenience
pub use entitlement::{EntitlementStore, InMemoryEntitlementStore};
pub use error::{Error, Result, ScanError};
pub use identity::Identity;
pub use quota::{Admission, QuotaConfig, QuotaGate};
pub use scan::{RenderSession, RenderingEngine, ScanConfig, ScanOrchestrator};
pub use server::AppState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
