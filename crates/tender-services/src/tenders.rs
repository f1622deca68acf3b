//! Tender listing, quota, manual registration and readiness

use chrono::{Datelike, TimeZone, Utc};
use platform::{fetch, fetch_one, Query};
use readiness_engine::patterns::STANDARD_MANDATORY_DOCS;
use readiness_engine::plans::{check_tender_limit, LimitCheck};
use readiness_engine::validation;
use readiness_engine::{ReadinessEngine, ReadinessReport};
use serde_json::{json, Value};
use tender_types::{
    ApiResponse, ComplianceDocument, ComplianceRequirement, ManualTenderData, Readiness, RuleCategory,
    Tender, TenderStatus,
};
use tracing::{info, warn};

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct TenderService {
    ctx: ServiceContext,
}

impl TenderService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    fn owned(&self, query: Query) -> Query {
        match self.ctx.user_id() {
            Some(user_id) => query.eq("user_id", user_id),
            None => query,
        }
    }

    /// Newest first
    pub async fn list(&self) -> ApiResponse<Vec<Tender>> {
        let query = self.owned(Query::table("tenders").order("created_at", false));
        self.ctx
            .run(async { Ok(fetch(self.ctx.db.as_ref(), &query).await?) })
            .await
    }

    pub async fn get(&self, id: &str) -> ApiResponse<Tender> {
        self.ctx.run(self.load(id)).await
    }

    async fn load(&self, id: &str) -> ServiceResult<Tender> {
        let db = self.ctx.db.as_ref();
        let mut tender: Tender = fetch_one(db, &Query::table("tenders").eq("id", id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Tender {id} not found")))?;
        let requirements: Vec<ComplianceRequirement> =
            fetch(db, &Query::table("compliance_requirements").eq("tender_id", id)).await?;
        tender.compliance_requirements = Some(requirements);
        Ok(tender)
    }

    pub async fn delete(&self, id: &str) -> ApiResponse<u64> {
        self.ctx
            .run(async { Ok(self.ctx.db.delete(&Query::table("tenders").eq("id", id)).await?) })
            .await
    }

    /// Whether the current user may create another tender this month
    pub async fn check_subscription_limit(&self) -> ServiceResult<LimitCheck> {
        let Ok(user) = self.ctx.user() else {
            return Ok(LimitCheck::denied("Not authenticated"));
        };
        let db = self.ctx.db.as_ref();

        let subscription = db
            .select(
                &Query::table("subscriptions")
                    .select("plan_name,status")
                    .eq("user_id", user.id.as_str())
                    .eq("status", "active")
                    .limit(1),
            )
            .await?;
        let plan_name = subscription
            .first()
            .and_then(|row| row.get("plan_name"))
            .and_then(Value::as_str);

        let now = self.ctx.now();
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let created = db
            .count(
                &Query::table("tenders")
                    .eq("user_id", user.id.as_str())
                    .gte("created_at", month_start.to_rfc3339())
                    .neq("status", TenderStatus::Archived.as_str()),
            )
            .await?;

        Ok(check_tender_limit(plan_name, u32::try_from(created).unwrap_or(u32::MAX)))
    }

    /// Count of non-archived tenders
    pub async fn stats(&self) -> ApiResponse<u64> {
        let query = self.owned(Query::table("tenders").neq("status", TenderStatus::Archived.as_str()));
        self.ctx.run(async { Ok(self.ctx.db.count(&query).await?) }).await
    }

    /// Average compliance score of non-archived tenders, 0 when there are none
    pub async fn readiness_stats(&self) -> ApiResponse<u8> {
        let query = self.owned(
            Query::table("tenders")
                .select("compliance_score")
                .neq("status", TenderStatus::Archived.as_str()),
        );
        self.ctx
            .run(async {
                let rows = self.ctx.db.select(&query).await?;
                if rows.is_empty() {
                    return Ok(0);
                }
                let total: f64 = rows
                    .iter()
                    .filter_map(|r| r.get("compliance_score").and_then(Value::as_f64))
                    .sum();
                Ok((total / rows.len() as f64).round().clamp(0.0, 100.0) as u8)
            })
            .await
    }

    /// Five most recently updated non-archived tenders
    pub async fn recent(&self) -> ApiResponse<Vec<Tender>> {
        let query = self.owned(
            Query::table("tenders")
                .neq("status", TenderStatus::Archived.as_str())
                .order("updated_at", false)
                .limit(5),
        );
        self.ctx
            .run(async { Ok(fetch(self.ctx.db.as_ref(), &query).await?) })
            .await
    }

    /// Register a tender by hand with its requirement set, then score it
    /// against the owner's current documents.
    pub async fn create_manual(&self, data: &ManualTenderData) -> ApiResponse<Tender> {
        let user_id = match self.ctx.user() {
            Ok(user) => user.id.clone(),
            Err(e) => return ApiResponse::error(e.to_string(), e.status()),
        };
        let today = self.ctx.today();
        if let Err(e) = validation::text(&data.title, 3, "Title")
            .and_then(|_| validation::text(&data.client_name, 2, "Client name"))
            .and_then(|_| validation::future_date(&data.closing_date, "Closing date", today))
        {
            return ApiResponse::error(e.to_string(), 400);
        }

        let db = self.ctx.db.as_ref();
        let row = json!({
            "user_id": user_id,
            "title": data.title.trim(),
            "client_name": data.client_name.trim(),
            "closing_date": data.closing_date,
            "status": TenderStatus::Analyzing,
            "compliance_score": 0,
            "readiness": Readiness::Red,
        });
        let tender: Tender = match db.insert("tenders", vec![row]).await {
            Ok(rows) => match rows.into_iter().next().map(serde_json::from_value) {
                Some(Ok(tender)) => tender,
                Some(Err(e)) => return ApiResponse::error(e.to_string(), 500),
                None => return ApiResponse::error("Tender insert returned no row", 500),
            },
            Err(e) => return ApiResponse::error(e.to_string(), 500),
        };
        info!(tender_id = %tender.id, "manual tender created");

        let requirements = manual_requirements(&tender.id, data);
        if !requirements.is_empty() {
            let rows: Vec<Value> = match requirements.iter().map(serde_json::to_value).collect() {
                Ok(rows) => rows,
                Err(e) => return ApiResponse::error(e.to_string(), 500),
            };
            if let Err(e) = db.insert("compliance_requirements", rows).await {
                warn!(tender_id = %tender.id, error = %e, "requirement insert failed");
                return ApiResponse::partial(
                    tender,
                    format!("Tender created but requirement save failed: {}", e),
                );
            }
        }

        match self.score(&tender.id, &user_id).await {
            Ok(report) => {
                let patch = json!({
                    "status": TenderStatus::Draft,
                    "compliance_score": report.score,
                    "readiness": report.readiness,
                });
                match db.update(&Query::table("tenders").eq("id", tender.id.as_str()), patch).await {
                    Ok(updated) => {
                        let scored = updated
                            .into_iter()
                            .next()
                            .and_then(|row| serde_json::from_value::<Tender>(row).ok());
                        ApiResponse::created(scored.unwrap_or(tender))
                    }
                    Err(e) => ApiResponse::partial(tender, format!("Tender created but scoring failed: {}", e)),
                }
            }
            Err(e) => ApiResponse::partial(tender, format!("Tender created but scoring failed: {}", e)),
        }
    }

    /// Readiness of a tender against its owner's documents as of today
    pub async fn readiness(&self, tender_id: &str) -> ApiResponse<ReadinessReport> {
        self.ctx
            .run(async {
                let tender = self.load(tender_id).await?;
                self.score(tender_id, &tender.user_id).await
            })
            .await
    }

    async fn score(&self, tender_id: &str, owner_id: &str) -> ServiceResult<ReadinessReport> {
        let db = self.ctx.db.as_ref();
        let requirements: Vec<ComplianceRequirement> =
            fetch(db, &Query::table("compliance_requirements").eq("tender_id", tender_id)).await?;
        let documents: Vec<ComplianceDocument> =
            fetch(db, &Query::table("compliance_documents").eq("user_id", owner_id)).await?;
        Ok(ReadinessEngine::new().evaluate(&requirements, &documents, self.ctx.today()))
    }
}

/// Requirement rows for a manually registered tender
pub fn manual_requirements(tender_id: &str, data: &ManualTenderData) -> Vec<ComplianceRequirement> {
    let reqs = &data.requirements;
    let mut out = Vec::new();

    let grade = reqs.cidb_grade.as_deref().map(str::trim).filter(|g| !g.is_empty());
    let class = reqs.cidb_class.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if let (Some(grade), Some(class)) = (grade, class) {
        out.push(ComplianceRequirement::new(
            tender_id,
            RuleCategory::Cidb,
            format!("Minimum CIDB Grading of {}{}", grade, class),
            json!({ "grade": grade, "class": class }),
            true,
        ));
    }

    if let Some(level) = reqs.min_bbbee_level.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        out.push(ComplianceRequirement::new(
            tender_id,
            RuleCategory::Bbbee,
            format!("Minimum B-BBEE Level {}", level),
            json!({ "min_level": level.parse::<i64>().ok() }),
            false,
        ));
    }

    if reqs.mandatory_docs {
        out.push(ComplianceRequirement::new(
            tender_id,
            RuleCategory::MandatoryDoc,
            "Standard Administrative Compliance",
            json!({ "docs": STANDARD_MANDATORY_DOCS }),
            true,
        ));
    }

    out
}
