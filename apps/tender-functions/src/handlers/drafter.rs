//! `ai-drafter`: generate one tender response section and store it as a new
//! draft version, passing the model output through the safety gate first.

use axum::{body::Bytes, extract::State, Json};
use draft_safety::{next_version, system_prompt, user_context, SafetyGate, DEFAULT_COMPANY_NAME};
use platform::{fetch_one, insert_one, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tender_types::{AiDraft, AuditEntry, DraftStatus};
use tracing::info;

use super::record_audit;
use crate::error::{parse_body, FunctionError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    #[serde(default)]
    pub tender_id: Option<String>,
    #[serde(default)]
    pub section_name: Option<String>,
    /// Free-text instruction from the bidder
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub success: bool,
    pub draft_id: String,
    pub version: u32,
    pub status: DraftStatus,
    pub content: String,
}

#[derive(Deserialize)]
struct TenderContext {
    title: String,
    #[serde(default)]
    client_name: Option<String>,
    user_id: String,
}

#[derive(Deserialize)]
struct VersionRow {
    version: u32,
}

pub async fn handle_ai_drafter(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DraftResponse>, FunctionError> {
    let request: DraftRequest = parse_body(&body)?;
    let (tender_id, section) = match (
        request.tender_id.as_deref().filter(|s| !s.is_empty()),
        request.section_name.as_deref().filter(|s| !s.is_empty()),
    ) {
        (Some(t), Some(s)) => (t, s),
        _ => {
            return Err(FunctionError::BadRequest(
                "Missing tender_id or section_name".to_string(),
            ))
        }
    };

    let db = state.backend.service_db()?;

    let tender: TenderContext = fetch_one(
        db.as_ref(),
        &Query::table("tenders").select("title,client_name,user_id").eq("id", tender_id),
    )
    .await?
    .ok_or_else(|| FunctionError::BadRequest("Tender context not found".to_string()))?;

    let company = db
        .select(
            &Query::table("profiles")
                .select("company_name")
                .eq("id", tender.user_id.as_str())
                .limit(1),
        )
        .await?
        .into_iter()
        .next()
        .and_then(|row| row.get("company_name").and_then(|c| c.as_str()).map(str::to_string))
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string());

    let system = system_prompt(&company);
    let context = user_context(
        &tender.title,
        tender.client_name.as_deref(),
        section,
        request.prompt.as_deref(),
    );

    let decision = SafetyGate::default().decide(state.text.generate(&context, &system).await);

    let latest: Option<VersionRow> = fetch_one(
        db.as_ref(),
        &Query::table("ai_drafts")
            .select("version")
            .eq("tender_id", tender_id)
            .eq("section_name", section)
            .order("version", false)
            .limit(1),
    )
    .await?;
    let version = next_version(latest.map(|row| row.version));

    let draft = AiDraft {
        id: String::new(),
        tender_id: tender_id.to_string(),
        section_name: section.to_string(),
        version,
        content_markdown: decision.content.clone(),
        status: decision.status,
        user_feedback: Some(decision.notes.clone()),
        created_at: None,
    };
    let stored = insert_one(db.as_ref(), "ai_drafts", &draft).await?;

    let (action, severity) = decision.audit();
    record_audit(
        db.as_ref(),
        AuditEntry::new(
            action.as_str(),
            severity,
            json!({"section": section, "version": version, "safety_notes": decision.notes}),
        )
        .for_tender(tender_id),
    )
    .await;

    info!(tender_id, section, version, status = decision.status.as_str(), "draft stored");

    Ok(Json(DraftResponse {
        success: true,
        draft_id: stored.id,
        version,
        status: decision.status,
        content: decision.content,
    }))
}
