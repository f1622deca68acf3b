//! `compliance-validator`: score a tender against the owner's current
//! compliance documents and persist the per-requirement checks.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use platform::{fetch, fetch_one, Query};
use readiness_engine::{ReadinessEngine, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tender_types::{
    AuditAction, AuditEntry, AuditSeverity, ComplianceDocument, ComplianceRequirement, Readiness,
    TenderStatus,
};
use tracing::info;

use super::record_audit;
use crate::error::{parse_body, FunctionError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub tender_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub readiness: Readiness,
    pub score: u8,
    pub checks: Vec<Verdict>,
}

#[derive(Deserialize)]
struct TenderOwner {
    user_id: String,
}

pub async fn handle_compliance_validator(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ValidateResponse>, FunctionError> {
    let request: ValidateRequest = parse_body(&body)?;
    let tender_id = request
        .tender_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FunctionError::BadRequest("Missing tender_id".to_string()))?;

    let db = state.backend.service_db()?;

    let requirements: Vec<ComplianceRequirement> = fetch(
        db.as_ref(),
        &Query::table("compliance_requirements").eq("tender_id", tender_id.as_str()),
    )
    .await?;

    let owner: TenderOwner = fetch_one(
        db.as_ref(),
        &Query::table("tenders").select("user_id").eq("id", tender_id.as_str()),
    )
    .await?
    .ok_or_else(|| FunctionError::BadRequest("Tender not found".to_string()))?;

    let documents: Vec<ComplianceDocument> = fetch(
        db.as_ref(),
        &Query::table("compliance_documents").eq("user_id", owner.user_id.as_str()),
    )
    .await?;

    let report = ReadinessEngine::new().evaluate(&requirements, &documents, Utc::now().date_naive());

    // Replace the previous run's checks
    db.delete(&Query::table("compliance_checks").eq("tender_id", tender_id.as_str()))
        .await?;
    if !report.checks.is_empty() {
        let rows = report
            .checks
            .iter()
            .map(|verdict| serde_json::to_value(verdict.to_check(&tender_id)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FunctionError::Internal(e.to_string()))?;
        db.insert("compliance_checks", rows).await?;
    }

    let status = if report.readiness == Readiness::Red {
        TenderStatus::NonCompliant
    } else {
        TenderStatus::Compliant
    };
    db.update(
        &Query::table("tenders").eq("id", tender_id.as_str()),
        json!({
            "compliance_score": report.score,
            "readiness": report.readiness,
            "status": status,
        }),
    )
    .await?;

    let severity = if report.readiness == Readiness::Red {
        AuditSeverity::Warn
    } else {
        AuditSeverity::Info
    };
    record_audit(
        db.as_ref(),
        AuditEntry::new(
            AuditAction::ValidationComplete.as_str(),
            severity,
            json!({"score": report.score, "readiness": report.readiness}),
        )
        .for_tender(&tender_id),
    )
    .await;

    info!(
        tender_id = %tender_id,
        score = report.score,
        readiness = report.readiness.as_str(),
        "validation complete"
    );

    Ok(Json(ValidateResponse {
        success: true,
        readiness: report.readiness,
        score: report.score,
        checks: report.checks,
    }))
}
