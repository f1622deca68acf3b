//! Admin console: platform RPCs, broadcasts, template management,
//! revenue and system health

use platform::{fetch, fetch_one, Query, TEMPLATES_BUCKET};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tender_types::{
    ApiResponse, BroadcastPriority, ComplianceDocument, ErrorLog, Profile, SubscriptionHistoryEntry,
    SystemMessage, Template,
};
use tracing::{info, warn};

use crate::context::ServiceContext;
use crate::error::{ServiceError, ServiceResult};
use crate::health::{assess, HealthWindow, SystemHealth};
use crate::revenue::{self, MonthlyStatement, RevenueRange, RevenueReport, RevenueSummary, UserRef};

/// A template file uploaded from the admin console
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub title: String,
    pub code: String,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub profile: Option<Profile>,
    pub docs: Vec<ComplianceDocument>,
    pub tender_count: u64,
    pub history: Vec<SubscriptionHistoryEntry>,
}

#[derive(Clone)]
pub struct AdminService {
    ctx: ServiceContext,
}

impl AdminService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    async fn call(&self, function: &str, args: Value) -> ApiResponse<Value> {
        self.ctx
            .run(async { Ok(self.ctx.db.rpc(function, args).await?) })
            .await
    }

    pub async fn stats(&self) -> ApiResponse<Value> {
        self.call("get_admin_stats", json!({})).await
    }

    pub async fn users(&self) -> ApiResponse<Value> {
        self.call("get_admin_users", json!({})).await
    }

    pub async fn analytics(&self) -> ApiResponse<Value> {
        self.call("get_admin_analytics", json!({})).await
    }

    pub async fn user_growth(&self, period: &str) -> ApiResponse<Value> {
        self.call("get_user_growth", json!({ "period": period })).await
    }

    pub async fn broadcast(
        &self,
        title: &str,
        message: &str,
        priority: BroadcastPriority,
    ) -> ApiResponse<SystemMessage> {
        self.ctx
            .run_with_status(201, async {
                let user = self.ctx.user()?;
                let row = SystemMessage {
                    id: String::new(),
                    title: title.trim().to_string(),
                    message: message.trim().to_string(),
                    priority,
                    created_by: Some(user.id.clone()),
                    created_at: None,
                };
                let stored = platform::insert_one(self.ctx.db.as_ref(), "system_messages", &row).await?;
                info!(priority = ?priority, "broadcast published");
                Ok(stored)
            })
            .await
    }

    pub async fn broadcasts(&self) -> ApiResponse<Vec<SystemMessage>> {
        let query = Query::table("system_messages").order("created_at", false);
        self.ctx
            .run(async { Ok(fetch(self.ctx.db.as_ref(), &query).await?) })
            .await
    }

    pub async fn delete_broadcast(&self, id: &str) -> ApiResponse<u64> {
        self.ctx
            .run(async { Ok(self.ctx.db.delete(&Query::table("system_messages").eq("id", id)).await?) })
            .await
    }

    pub async fn upload_template(&self, upload: TemplateUpload) -> ApiResponse<Template> {
        self.ctx
            .run_with_status(201, async {
                let path = format!("public/{}_{}", self.ctx.now().timestamp_millis(), upload.file_name);
                self.ctx
                    .storage
                    .upload(TEMPLATES_BUCKET, &path, upload.bytes, &upload.content_type)
                    .await?;
                let row = json!({
                    "title": upload.title,
                    "code": upload.code,
                    "category": upload.category,
                    "description": upload.description,
                    "file_url": path,
                    "is_active": true,
                });
                let stored = self
                    .ctx
                    .db
                    .insert("templates", vec![row])
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ServiceError::NotFound("Template insert returned no row".into()))?;
                Ok(serde_json::from_value(stored)?)
            })
            .await
    }

    pub async fn update_template(&self, id: &str, update: &TemplateUpdate) -> ApiResponse<Template> {
        self.ctx
            .run(async {
                let patch = serde_json::to_value(update)?;
                self.patch_template(id, patch).await
            })
            .await
    }

    /// Hide a template from users without deleting its file
    pub async fn archive_template(&self, id: &str) -> ApiResponse<Template> {
        self.ctx
            .run(async {
                let patch = json!({ "is_active": false, "archive_date": self.ctx.now().to_rfc3339() });
                self.patch_template(id, patch).await
            })
            .await
    }

    async fn patch_template(&self, id: &str, patch: Value) -> ServiceResult<Template> {
        let row = self
            .ctx
            .db
            .update(&Query::table("templates").eq("id", id), patch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("Template {id} not found")))?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete_template(&self, id: &str) -> ApiResponse<u64> {
        self.ctx
            .run(async {
                let query = Query::table("templates").eq("id", id);
                let template: Option<Template> = fetch_one(self.ctx.db.as_ref(), &query).await?;
                if let Some(template) = template {
                    if let Err(e) = self
                        .ctx
                        .storage
                        .remove(TEMPLATES_BUCKET, &[template.file_url.clone()])
                        .await
                    {
                        warn!(path = %template.file_url, error = %e, "template file not removed");
                    }
                }
                Ok(self.ctx.db.delete(&query).await?)
            })
            .await
    }

    async fn user_index(&self) -> std::collections::HashMap<String, UserRef> {
        match self.ctx.db.rpc("get_admin_users", json!({})).await {
            Ok(users) => revenue::user_index(&users),
            Err(e) => {
                warn!(error = %e, "admin users unavailable, transactions will be unattributed");
                Default::default()
            }
        }
    }

    async fn history_since(&self, since: Option<chrono::DateTime<chrono::Utc>>) -> ServiceResult<Vec<SubscriptionHistoryEntry>> {
        let mut query = Query::table("subscription_history").order("created_at", false);
        if let Some(since) = since {
            query = query.gte("created_at", since.to_rfc3339());
        }
        Ok(fetch(self.ctx.db.as_ref(), &query).await?)
    }

    pub async fn revenue(&self, range: RevenueRange) -> ApiResponse<RevenueReport> {
        self.ctx
            .run(async {
                let entries = self.history_since(Some(range.start(self.ctx.now()))).await?;
                let users = self.user_index().await;
                Ok(revenue::build_report(&entries, &users))
            })
            .await
    }

    pub async fn revenue_summary(&self) -> ApiResponse<RevenueSummary> {
        self.ctx
            .run(async {
                let entries = self.history_since(None).await?;
                Ok(revenue::summarize(&entries, self.ctx.now()))
            })
            .await
    }

    pub async fn available_months(&self) -> ApiResponse<Vec<String>> {
        self.ctx
            .run(async {
                let entries = self.history_since(None).await?;
                let dates: Vec<_> = entries.iter().map(|e| e.created_at).collect();
                Ok(revenue::available_months(&dates))
            })
            .await
    }

    pub async fn monthly_statement(&self, year: i32, month: u32) -> ApiResponse<MonthlyStatement> {
        self.ctx
            .run(async {
                let (start, end) = revenue::month_bounds(year, month)
                    .ok_or_else(|| ServiceError::Invalid(format!("Invalid month: {year}-{month}")))?;
                let query = Query::table("subscription_history")
                    .gte("created_at", start.to_rfc3339())
                    .lt("created_at", end.to_rfc3339())
                    .order("created_at", false);
                let entries: Vec<SubscriptionHistoryEntry> = fetch(self.ctx.db.as_ref(), &query).await?;
                let users = self.user_index().await;
                Ok(revenue::statement(year, month, &entries, &users))
            })
            .await
    }

    pub async fn user_details(&self, user_id: &str) -> ApiResponse<UserDetails> {
        self.ctx
            .run(async {
                let db = self.ctx.db.as_ref();
                let profile = fetch_one(db, &Query::table("profiles").eq("id", user_id)).await?;
                let docs = fetch(db, &Query::table("compliance_documents").eq("user_id", user_id)).await?;
                let tender_count = db.count(&Query::table("tenders").eq("user_id", user_id)).await?;
                let history = fetch(
                    db,
                    &Query::table("subscription_history")
                        .eq("user_id", user_id)
                        .order("created_at", false),
                )
                .await?;
                Ok(UserDetails {
                    profile,
                    docs,
                    tender_count,
                    history,
                })
            })
            .await
    }

    pub async fn system_health(&self, window: HealthWindow) -> ApiResponse<SystemHealth> {
        self.ctx
            .run(async {
                let query = Query::table("error_logs")
                    .gte("created_at", window.start(self.ctx.now()).to_rfc3339())
                    .order("created_at", false);
                let logs: Vec<ErrorLog> = fetch(self.ctx.db.as_ref(), &query).await?;
                Ok(assess(window, &logs))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use crate::testing::context;
    use pretty_assertions::assert_eq;

    fn history(db: &platform::MemoryDatabase) {
        db.seed(
            "subscription_history",
            vec![
                json!({"id": "h1", "user_id": "u1", "plan_name": "Pro", "amount": 499.0, "status": "paid", "created_at": "2025-06-08T10:00:00+00:00"}),
                json!({"id": "h2", "user_id": "u2", "plan_name": "Standard", "amount": 199.0, "status": "paid", "created_at": "2025-05-01T10:00:00+00:00"}),
                json!({"id": "h3", "user_id": "u1", "plan_name": "Pro", "amount": 499.0, "status": "paid", "created_at": "2024-11-20T10:00:00+00:00"}),
            ],
        );
        db.register_rpc("get_admin_users", |_, _| {
            Ok(json!([{ "id": "u1", "email": "owner@acme.co.za", "company_name": "Acme Civils" }]))
        });
    }

    #[tokio::test]
    async fn test_revenue_report_for_range() {
        let (ctx, db, _) = context("admin");
        history(&db);
        let service = AdminService::new(ctx);

        let report = service.revenue(RevenueRange::Week).await.data.unwrap();
        assert_eq!(report.total_revenue, 499.0);
        assert_eq!(report.transactions[0].company_name, "Acme Civils");

        let report = service.revenue(RevenueRange::Quarter).await.data.unwrap();
        assert_eq!(report.total_revenue, 698.0);
        assert_eq!(report.graph_data[0].date, "2025-05-01");
        assert_eq!(report.transactions[1].user_email, "Unknown Email");
    }

    #[tokio::test]
    async fn test_summary_months_and_statement() {
        let (ctx, db, _) = context("admin");
        history(&db);
        let service = AdminService::new(ctx);

        let summary = service.revenue_summary().await.data.unwrap();
        assert_eq!(summary.revenue_30d, 499.0);
        assert_eq!(summary.lifetime_revenue, 1197.0);

        assert_eq!(
            service.available_months().await.data.unwrap(),
            vec!["2025-06", "2025-05", "2024-11"]
        );

        let statement = service.monthly_statement(2024, 11).await.data.unwrap();
        assert_eq!(statement.count, 1);
        assert_eq!(statement.transactions[0].user_email, "owner@acme.co.za");
        assert_eq!(service.monthly_statement(2024, 0).await.status, 400);
    }

    #[tokio::test]
    async fn test_template_lifecycle() {
        let (ctx, db, storage) = context("admin");
        let service = AdminService::new(ctx);

        let template = service
            .upload_template(TemplateUpload {
                file_name: "sbd1.docx".into(),
                bytes: b"docx".to_vec(),
                content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document".into(),
                title: "Invitation to Bid".into(),
                code: "SBD1".into(),
                category: Some("SBD".into()),
                description: None,
            })
            .await
            .data
            .unwrap();
        assert!(template.file_url.starts_with("public/"));
        assert!(template.is_active);

        let archived = service.archive_template(&template.id).await.data.unwrap();
        assert!(!archived.is_active);
        assert!(db.rows("templates")[0]["archive_date"].is_string());

        let renamed = service
            .update_template(&template.id, &TemplateUpdate { title: Some("SBD 1".into()), ..Default::default() })
            .await
            .data
            .unwrap();
        assert_eq!(renamed.title, "SBD 1");

        assert_eq!(service.delete_template(&template.id).await.data, Some(1));
        assert!(storage.paths(TEMPLATES_BUCKET).is_empty());
    }

    #[tokio::test]
    async fn test_broadcasts() {
        let (ctx, db, _) = context("admin");
        let service = AdminService::new(ctx);

        let message = service
            .broadcast("Maintenance", "Down at 22:00", BroadcastPriority::Warning)
            .await;
        assert_eq!(message.status, 201);
        assert_eq!(db.rows("system_messages")[0]["created_by"], json!("admin"));

        let id = message.data.unwrap().id;
        assert_eq!(service.broadcasts().await.data.unwrap().len(), 1);
        assert_eq!(service.delete_broadcast(&id).await.data, Some(1));
    }

    #[tokio::test]
    async fn test_user_details_and_health() {
        let (ctx, db, _) = context("admin");
        history(&db);
        db.seed("profiles", vec![json!({"id": "u1", "company_name": "Acme Civils"})]);
        db.seed(
            "error_logs",
            vec![
                json!({"id": "e1", "page": "/admin", "description": "RPC get_admin_stats failed", "severity": "warning", "created_at": "2025-06-10T08:30:00+00:00"}),
                json!({"id": "e2", "page": "/old", "description": "crash", "severity": "critical", "created_at": "2025-05-01T00:00:00+00:00"}),
            ],
        );
        let service = AdminService::new(ctx);

        let details = service.user_details("u1").await.data.unwrap();
        assert_eq!(details.history.len(), 2);
        assert_eq!(details.tender_count, 0);
        assert_eq!(details.profile.unwrap().company_name.as_deref(), Some("Acme Civils"));

        let health = service.system_health(HealthWindow::Day).await.data.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.signals.rpc_failures, 1);

        let health = service.system_health(HealthWindow::Week).await.data.unwrap();
        assert_eq!(health.signals.errors, 1);
    }

    #[tokio::test]
    async fn test_rpc_wrappers() {
        let (ctx, db, _) = context("admin");
        db.register_rpc("get_user_growth", |_, args| Ok(json!({ "period": args["period"] })));
        let service = AdminService::new(ctx);

        assert_eq!(service.user_growth("30d").await.data, Some(json!({ "period": "30d" })));
        assert_eq!(service.analytics().await.status, 404);
    }
}
