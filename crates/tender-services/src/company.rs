//! Company profile, compliance vault and alerts

use chrono::Duration;
use platform::{fetch, fetch_one, Query, COMPLIANCE_BUCKET};
use readiness_engine::patterns::{doc_label, REFERENCE_NUMBER_KEYS};
use readiness_engine::{document_status, taxonomy, validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tender_types::{Alert, ApiResponse, ComplianceDocument, DocumentStatus, Profile, Tender};
use tracing::{debug, info, warn};

use crate::alerts::{dedup, due_alerts, DEDUP_WINDOW_DAYS};
use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};

/// Valid documents needed for a full compliance score
pub const COMPLIANCE_TARGET_DOCS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceStats {
    pub compliance_score: u8,
    pub valid: usize,
    /// Documents in warning or already expired
    pub expiring: usize,
    pub total: usize,
}

impl ComplianceStats {
    pub fn from_statuses(statuses: &[DocumentStatus]) -> Self {
        let valid = statuses.iter().filter(|s| **s == DocumentStatus::Valid).count();
        let expiring = statuses
            .iter()
            .filter(|s| matches!(s, DocumentStatus::Warning | DocumentStatus::Expired))
            .count();
        let score = (valid as f64 / COMPLIANCE_TARGET_DOCS as f64 * 100.0).round().min(100.0);
        Self {
            compliance_score: score as u8,
            valid,
            expiring,
            total: statuses.len(),
        }
    }
}

/// A compliance document as received from the client
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub category: String,
    pub doc_type: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_reference_number: Option<String>,
}

/// Reference number carried in upload metadata; later keys win
pub fn reference_number(metadata: &Value) -> Option<String> {
    REFERENCE_NUMBER_KEYS
        .iter()
        .filter_map(|key| metadata.get(*key))
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .last()
}

#[derive(Clone)]
pub struct CompanyService {
    ctx: ServiceContext,
}

impl CompanyService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn profile(&self) -> ApiResponse<Profile> {
        self.ctx
            .run(async {
                let user = self.ctx.user()?;
                fetch_one(self.ctx.db.as_ref(), &Query::table("profiles").eq("id", user.id.as_str()))
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Profile not found".into()))
            })
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResponse<Profile> {
        self.ctx
            .run(async {
                let user = self.ctx.user()?;
                if let Some(reg) = update.registration_number.as_deref() {
                    validation::registration_number(reg)?;
                }
                if let Some(tax) = update.tax_reference_number.as_deref() {
                    validation::tax_number(tax)?;
                }
                let rows = self
                    .ctx
                    .db
                    .update(
                        &Query::table("profiles").eq("id", user.id.as_str()),
                        serde_json::to_value(update)?,
                    )
                    .await?;
                let row = rows
                    .into_iter()
                    .next()
                    .ok_or_else(|| ServiceError::NotFound("Profile not found".into()))?;
                Ok(serde_json::from_value(row)?)
            })
            .await
    }

    /// The user's documents, newest first, with status recomputed for today
    pub async fn documents(&self) -> ApiResponse<Vec<ComplianceDocument>> {
        self.ctx.run(self.load_documents()).await
    }

    async fn load_documents(&self) -> ServiceResult<Vec<ComplianceDocument>> {
        let user = self.ctx.user()?;
        let today = self.ctx.today();
        let mut docs: Vec<ComplianceDocument> = fetch(
            self.ctx.db.as_ref(),
            &Query::table("compliance_documents")
                .eq("user_id", user.id.as_str())
                .order("created_at", false),
        )
        .await?;
        for doc in &mut docs {
            doc.status = Some(document_status(doc, today));
        }
        Ok(docs)
    }

    pub async fn stats(&self) -> ApiResponse<ComplianceStats> {
        self.ctx
            .run(async {
                let docs = self.load_documents().await?;
                let statuses: Vec<DocumentStatus> = docs.iter().filter_map(|d| d.status).collect();
                Ok(ComplianceStats::from_statuses(&statuses))
            })
            .await
    }

    /// Store the file, record it, then retire the user's previous document of the same type
    pub async fn upload_document(&self, upload: DocumentUpload) -> ApiResponse<ComplianceDocument> {
        self.ctx
            .run_with_status(201, async {
                let user = self.ctx.user()?;
                let errors = taxonomy::validate_metadata(&upload.doc_type, &upload.metadata);
                if !errors.is_empty() {
                    let message: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                    return Err(ServiceError::Invalid(message.join("; ")));
                }

                let db = self.ctx.db.as_ref();
                let previous: Vec<ComplianceDocument> = fetch(
                    db,
                    &Query::table("compliance_documents")
                        .eq("user_id", user.id.as_str())
                        .eq("doc_type", upload.doc_type.as_str()),
                )
                .await?;

                let path = format!(
                    "{}/{}/{}/{}_{}",
                    user.id,
                    upload.category,
                    upload.doc_type,
                    self.ctx.now().timestamp_millis(),
                    upload.file_name
                );
                self.ctx
                    .storage
                    .upload(COMPLIANCE_BUCKET, &path, upload.bytes, &upload.content_type)
                    .await?;

                let title = taxonomy::lookup(&upload.doc_type)
                    .map(|spec| spec.label)
                    .unwrap_or_else(|| doc_label(&upload.doc_type));
                let row = json!({
                    "user_id": user.id,
                    "category": upload.category,
                    "doc_type": upload.doc_type,
                    "title": title,
                    "file_name": upload.file_name,
                    "file_url": path,
                    "status": DocumentStatus::Valid,
                    "expiry_date": upload.metadata.get("expiryDate").cloned().unwrap_or(Value::Null),
                    "issue_date": self.ctx.now().to_rfc3339(),
                    "reference_number": reference_number(&upload.metadata),
                    "metadata": upload.metadata,
                });
                let stored = db
                    .insert("compliance_documents", vec![row])
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ServiceError::NotFound("Document insert returned no row".into()))?;
                let mut document: ComplianceDocument = serde_json::from_value(stored)?;
                document.status = Some(document_status(&document, self.ctx.today()));
                info!(doc_type = %document.doc_type, path = %path, "compliance document uploaded");

                for old in previous {
                    self.retire(&old).await;
                }
                Ok(document)
            })
            .await
    }

    async fn retire(&self, doc: &ComplianceDocument) {
        if let Some(path) = doc.file_url.as_deref().filter(|p| !p.is_empty()) {
            if let Err(e) = self.ctx.storage.remove(COMPLIANCE_BUCKET, &[path.to_string()]).await {
                warn!(path, error = %e, "could not remove replaced file");
            }
        }
        if let Err(e) = self
            .ctx
            .db
            .delete(&Query::table("compliance_documents").eq("id", doc.id.as_str()))
            .await
        {
            warn!(doc_id = %doc.id, error = %e, "could not delete replaced document row");
        }
    }

    /// Remove the stored file when possible, then the row
    pub async fn delete_document(&self, id: &str) -> ApiResponse<u64> {
        self.ctx
            .run(async {
                let db = self.ctx.db.as_ref();
                let query = Query::table("compliance_documents").eq("id", id);
                let row = db.select(&query.clone().select("file_url")).await?;
                let path = row
                    .first()
                    .and_then(|r| r.get("file_url"))
                    .and_then(Value::as_str)
                    .filter(|p| !p.is_empty());
                if let Some(path) = path {
                    if let Err(e) = self.ctx.storage.remove(COMPLIANCE_BUCKET, &[path.to_string()]).await {
                        warn!(path, error = %e, "storage removal failed, deleting row anyway");
                    }
                }
                Ok(db.delete(&query).await?)
            })
            .await
    }

    /// Raise any alerts now due, then list the user's alerts newest first
    pub async fn alerts(&self) -> ApiResponse<Vec<Alert>> {
        self.ctx
            .run(async {
                let user = self.ctx.user()?;
                if let Err(e) = self.generate_alerts().await {
                    warn!(error = %e, "alert generation failed");
                }
                Ok(fetch(
                    self.ctx.db.as_ref(),
                    &Query::table("alerts")
                        .eq("user_id", user.id.as_str())
                        .order("created_at", false),
                )
                .await?)
            })
            .await
    }

    /// Insert due alerts not already raised in the dedup window; returns how many were added
    pub async fn generate_alerts(&self) -> ServiceResult<usize> {
        let user = self.ctx.user()?;
        let db = self.ctx.db.as_ref();
        let documents = self.load_documents().await?;
        let tenders: Vec<Tender> =
            fetch(db, &Query::table("tenders").eq("user_id", user.id.as_str())).await?;

        let since = self.ctx.now() - Duration::days(DEDUP_WINDOW_DAYS);
        let recent = db
            .select(
                &Query::table("alerts")
                    .select("message")
                    .eq("user_id", user.id.as_str())
                    .gte("created_at", since.to_rfc3339()),
            )
            .await?;
        let recent: Vec<String> = recent
            .iter()
            .filter_map(|r| r.get("message").and_then(Value::as_str).map(str::to_string))
            .collect();

        let fresh = dedup(due_alerts(&user.id, &documents, &tenders, self.ctx.today()), &recent);
        if fresh.is_empty() {
            return Ok(0);
        }
        let now = self.ctx.now().to_rfc3339();
        let rows = fresh
            .iter()
            .map(|alert| {
                let mut row = serde_json::to_value(alert)?;
                if let Value::Object(map) = &mut row {
                    map.insert("created_at".into(), Value::String(now.clone()));
                }
                Ok(row)
            })
            .collect::<Result<Vec<Value>, serde_json::Error>>()?;
        db.insert("alerts", rows).await?;
        debug!(count = fresh.len(), "alerts raised");
        Ok(fresh.len())
    }

    pub async fn mark_alert_read(&self, id: &str) -> ApiResponse<usize> {
        self.ctx
            .run(async {
                let rows = self
                    .ctx
                    .db
                    .update(&Query::table("alerts").eq("id", id), json!({ "is_read": true }))
                    .await?;
                Ok(rows.len())
            })
            .await
    }

    pub async fn mark_all_alerts_read(&self) -> ApiResponse<usize> {
        self.ctx
            .run(async {
                let user = self.ctx.user()?;
                let mut patch = Map::new();
                patch.insert("is_read".into(), Value::Bool(true));
                let rows = self
                    .ctx
                    .db
                    .update(
                        &Query::table("alerts").eq("user_id", user.id.as_str()).eq("is_read", false),
                        Value::Object(patch),
                    )
                    .await?;
                Ok(rows.len())
            })
            .await
    }
}
