//! Route table shared by the binary and the handler tests

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    analyze::{handle_analyze_document, handle_analyze_status},
    audit::handle_audit_logger,
    drafter::handle_ai_drafter,
    handle_health,
    ingest::handle_ingest_tender,
    notify::handle_notify_admin,
    report::handle_send_weekly_report,
    validator::handle_compliance_validator,
};
use crate::state::AppState;

/// Functions are mounted under the hosted platform's path prefix
pub const FUNCTIONS_PREFIX: &str = "/functions/v1";

pub fn router(state: AppState) -> Router {
    let functions = Router::new()
        .route(
            "/analyze-document",
            get(handle_analyze_status).post(handle_analyze_document),
        )
        .route("/ai-drafter", post(handle_ai_drafter))
        .route("/compliance-validator", post(handle_compliance_validator))
        .route("/notify-admin", post(handle_notify_admin))
        .route("/audit-logger", post(handle_audit_logger))
        .route("/ingest-tender", post(handle_ingest_tender))
        .route(
            "/send-weekly-report",
            get(handle_send_weekly_report).post(handle_send_weekly_report),
        );

    Router::new()
        .route("/health", get(handle_health))
        .nest(FUNCTIONS_PREFIX, functions)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
