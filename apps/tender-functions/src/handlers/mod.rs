//! HTTP handlers, one module per hosted function

pub mod analyze;
pub mod audit;
pub mod drafter;
pub mod ingest;
pub mod notify;
pub mod report;
pub mod validator;

use axum::Json;
use platform::{insert_one, Database};
use serde::Serialize;
use tender_types::AuditEntry;
use tracing::warn;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "tender-functions",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Append to `audit_logs`. A failed write never fails the function.
pub(crate) async fn record_audit(db: &dyn Database, entry: AuditEntry) {
    let action = entry.action.clone();
    if let Err(e) = insert_one(db, "audit_logs", &entry).await {
        warn!(action = %action, "audit write failed: {}", e);
    }
}
