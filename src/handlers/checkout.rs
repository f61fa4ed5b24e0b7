//! `POST /create-checkout-session`

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::error::Result;
use crate::identity::ClientIdentity;
use crate::metrics::global_metrics;
use crate::server::AppState;

/// Response body: where to send the buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    /// Hosted checkout page
    pub url: String,
}

/// Create a checkout session tagged with the caller's identity
#[instrument(skip_all, fields(identity = %identity))]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
) -> Result<Json<CheckoutResponse>> {
    let redirect = state
        .checkout
        .create_session(&identity)
        .await
        .map_err(|e| {
            error!(error = %e, "Checkout session creation failed");
            e
        })?;

    global_metrics().record_checkout_session();
    Ok(Json(CheckoutResponse { url: redirect.url }))
}
