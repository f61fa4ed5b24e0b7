//! Stripe payment integration
//!
//! Implements the purchase path of the gateway:
//!
//! - **Checkout**: creates a hosted checkout session for the 24h unlock,
//!   tagged with the buyer's identity
//! - **Signature Verification**: HMAC-SHA256 validation of the
//!   `stripe-signature` header over the raw body
//! - **Event Handling**: `checkout.session.completed` grants a 24h
//!   entitlement; all other events are acknowledged and ignored
//!
//! # Architecture
//!
//! ```text
//! POST /create-checkout-session ──> StripeCheckoutClient ──> Stripe API
//!                                                              │
//!                                          (buyer pays)        ▼
//! POST /webhook ──> SignatureVerifier ──> EventProcessor ──> EntitlementStore
//!                        │
//!                        ▼
//!                       400
//! ```
//!
//! # Security
//!
//! - Signing secret and API key loaded from environment
//! - Constant-time signature comparison
//! - Replay window on the signed timestamp

pub mod checkout;
pub mod config;
pub mod error;
pub mod events;
pub mod processor;
pub mod signature;
pub mod webhook;

pub use checkout::{CheckoutProvider, CheckoutRedirect, StripeCheckoutClient, UNLOCK_SKU};
pub use config::StripeConfig;
pub use error::{ProviderError, StripeWebhookError, StripeWebhookResult};
pub use events::{CheckoutSession, StripeEvent, StripeEventType, IDENTITY_METADATA_KEY};
pub use processor::{EventProcessor, WebhookOutcome};
pub use signature::{SignatureHeader, SignatureVerifier, SIGNATURE_HEADER};
pub use webhook::WebhookVerifier;
