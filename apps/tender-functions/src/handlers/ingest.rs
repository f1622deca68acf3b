//! `ingest-tender`: extract a tender pack's text, store it, and seed the
//! tender's default requirement set.

use axum::{body::Bytes, extract::State, Json};
use platform::TENDER_DOCUMENTS_BUCKET;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tender_types::{AuditAction, AuditEntry, AuditSeverity, ComplianceRequirement, RuleCategory};
use tracing::{info, warn};

use super::record_audit;
use crate::error::{parse_body, FunctionError};
use crate::extract::{extract_tender, TenderExtract};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub tender_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: &'static str,
}

/// CIDB killer at the detected (or default) grading plus the tax clearance killer
pub fn default_requirements(tender_id: &str, extract: &TenderExtract) -> Vec<ComplianceRequirement> {
    let (grade, class) = extract.cidb_target();
    vec![
        ComplianceRequirement::new(
            tender_id,
            RuleCategory::Cidb,
            format!("Must have CIDB Grade {}{} or higher", grade, class),
            json!({"grade": grade, "class": class}),
            true,
        ),
        ComplianceRequirement::new(
            tender_id,
            RuleCategory::MandatoryDoc,
            "Valid Tax Clearance Certificate required",
            json!({"doc_type": "TAX_CLEARANCE"}),
            true,
        ),
    ]
}

pub async fn handle_ingest_tender(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, FunctionError> {
    let request: IngestRequest = parse_body(&body)?;
    let (tender_id, file_path) = match (
        request.tender_id.as_deref().filter(|s| !s.is_empty()),
        request.file_path.as_deref().filter(|s| !s.is_empty()),
    ) {
        (Some(t), Some(p)) => (t, p),
        _ => {
            return Err(FunctionError::BadRequest(
                "Missing tender_id or file_path".to_string(),
            ))
        }
    };
    let file_name = request
        .file_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown.pdf".to_string());

    info!(tender_id, file = %file_name, "ingesting tender pack");

    let db = state.backend.service_db()?;
    let storage = state.backend.service_storage()?;

    let pdf = match storage.download(TENDER_DOCUMENTS_BUCKET, file_path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(file_path, "tender pack download failed: {}", e);
            None
        }
    };
    // pdf-extract is synchronous and may panic on hostile input
    let name = file_name.clone();
    let extract = tokio::task::spawn_blocking(move || extract_tender(&name, pdf.as_deref()))
        .await
        .unwrap_or_else(|e| {
            warn!("tender extraction aborted: {}", e);
            extract_tender(&file_name, None)
        });

    db.upsert(
        "tender_documents",
        vec![json!({
            "tender_id": tender_id,
            "file_path": file_path,
            "file_name": file_name,
            "extracted_text": extract.text,
            "metadata": extract.metadata,
            "doc_category": "TENDER_SPEC",
        })],
        "tender_id,file_path",
    )
    .await?;

    let rules = default_requirements(tender_id, &extract)
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FunctionError::Internal(e.to_string()))?;
    if let Err(e) = db.insert("compliance_requirements", rules).await {
        warn!(tender_id, "requirement insert failed: {}", e);
    }

    record_audit(
        db.as_ref(),
        AuditEntry::new(
            AuditAction::IngestComplete.as_str(),
            AuditSeverity::Info,
            json!({"file_name": request.file_name, "extracted": true, "source": extract.metadata.source}),
        )
        .for_tender(tender_id),
    )
    .await;

    Ok(Json(IngestResponse {
        success: true,
        message: "Ingestion and Rule Extraction Complete",
    }))
}
