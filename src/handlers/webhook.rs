//! `POST /webhook`
//!
//! Takes the body as raw bytes: the signature covers the exact payload, so
//! it must not pass through a JSON extractor first.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::server::AppState;
use crate::stripe::SIGNATURE_HEADER;

/// Acknowledgement body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    /// Always `true`
    pub received: bool,
}

/// Verify, apply, acknowledge
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    state.webhook.handle(&body, signature, Utc::now()).await?;
    Ok(Json(WebhookAck { received: true }))
}
