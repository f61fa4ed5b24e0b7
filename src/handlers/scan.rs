//! `POST /scan`
//!
//! Admission runs first: a denied caller never reaches URL validation or the
//! scanner, and an admitted free caller has spent their slot even if the
//! request then turns out to be malformed.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::browser::audit::AuditReport;
use crate::error::{Error, Result};
use crate::identity::ClientIdentity;
use crate::metrics::global_metrics;
use crate::quota::Admission;
use crate::server::AppState;

/// Request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Page to audit
    #[serde(default)]
    pub url: Option<String>,
}

/// Successful response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Full audit report
    pub results: AuditReport,
}

/// Gate, then scan
#[instrument(skip_all, fields(identity = %identity))]
pub async fn scan_handler(
    State(state): State<Arc<AppState>>,
    ClientIdentity(identity): ClientIdentity,
    body: std::result::Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>> {
    match state.quota.admit(&identity, Utc::now()).await {
        Admission::Allowed(basis) => debug!(?basis, "Scan admitted"),
        Admission::Denied { limit, .. } => {
            global_metrics().record_quota_denial();
            info!(limit, "Scan denied by quota");
            return Err(Error::quota_exceeded());
        }
    }

    // An unreadable body is treated the same as one without a URL
    let url = match body {
        Ok(Json(request)) => request.url,
        Err(rejection) => {
            debug!(error = %rejection, "Scan body rejected");
            None
        }
    };

    let results = state.scanner.scan_detached(url).await?;
    Ok(Json(ScanResponse { results }))
}
