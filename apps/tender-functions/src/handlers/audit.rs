//! `audit-logger`: append an audit row for an external caller and escalate
//! warnings to the tender owner.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use platform::{insert_one, Query};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tender_types::{Alert, AlertPriority, AuditEntry, AuditSeverity};
use tracing::{error, info, warn};

use crate::error::{parse_body, FunctionError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub tender_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub logged: bool,
}

/// Unknown severities are logged as INFO
pub fn parse_severity(raw: Option<&str>) -> AuditSeverity {
    match raw.map(|s| s.trim().to_uppercase()).as_deref() {
        Some("WARN") | Some("WARNING") => AuditSeverity::Warn,
        Some("ERROR") => AuditSeverity::Error,
        Some("CRITICAL") => AuditSeverity::Critical,
        _ => AuditSeverity::Info,
    }
}

/// First address of `x-forwarded-for`
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

pub async fn handle_audit_logger(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AuditResponse>, FunctionError> {
    let db = state.backend.service_db()?;
    let request: AuditRequest = parse_body(&body)?;

    let action = request
        .action
        .filter(|a| !a.is_empty())
        .ok_or_else(|| FunctionError::BadRequest("Missing action".to_string()))?;
    let severity = parse_severity(request.severity.as_deref());
    let tender_id = request.tender_id.filter(|t| !t.is_empty());
    let details = request.details.unwrap_or_else(|| json!({}));

    info!(action = %action, ?severity, "audit");

    let mut entry = AuditEntry::new(action.clone(), severity, details.clone());
    entry.actor_id = request.actor_id.filter(|a| !a.is_empty());
    entry.tender_id = tender_id.clone();
    entry.ip_address = client_ip(&headers);
    insert_one(db.as_ref(), "audit_logs", &entry).await?;

    match (severity, tender_id.as_deref()) {
        (AuditSeverity::Warn | AuditSeverity::Error, Some(tender_id)) => {
            let owner = db
                .select(&Query::table("tenders").select("user_id").eq("id", tender_id).limit(1))
                .await?
                .into_iter()
                .next()
                .and_then(|row| row.get("user_id").and_then(Value::as_str).map(str::to_string));

            if let Some(owner) = owner {
                let mut alert = Alert::new(
                    &owner,
                    AlertPriority::from(severity),
                    format!("Alert: {}. Check details.", action),
                );
                alert.tender_id = Some(tender_id.to_string());
                if let Err(e) = insert_one(db.as_ref(), "alerts", &alert).await {
                    warn!(tender_id, "alert insert failed: {}", e);
                }
            }
        }
        (AuditSeverity::Critical, _) => {
            error!("CRITICAL SYSTEM ALERT TRIGGERED");
            error!(action = %action, details = %details, "paging operator");
        }
        _ => {}
    }

    Ok(Json(AuditResponse { logged: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_severity() {
        assert_eq!(parse_severity(None), AuditSeverity::Info);
        assert_eq!(parse_severity(Some("warn")), AuditSeverity::Warn);
        assert_eq!(parse_severity(Some("ERROR")), AuditSeverity::Error);
        assert_eq!(parse_severity(Some("CRITICAL")), AuditSeverity::Critical);
        assert_eq!(parse_severity(Some("DEBUG")), AuditSeverity::Info);
    }

    #[test]
    fn test_client_ip_takes_first_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);
        headers.insert("x-forwarded-for", "196.21.4.2, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("196.21.4.2"));
    }
}
