//! HTTP handlers

pub mod checkout;
pub mod scan;
pub mod status;
pub mod webhook;

pub use checkout::{checkout_handler, CheckoutResponse};
pub use scan::{scan_handler, ScanRequest, ScanResponse};
pub use status::{health_handler, metrics_handler, status_handler, HealthResponse, StatusResponse};
pub use webhook::{webhook_handler, WebhookAck};
