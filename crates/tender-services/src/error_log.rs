//! Client error log and its admin views

use platform::{fetch, Query};
use serde_json::{json, Value};
use tender_types::{ApiResponse, ErrorLog};
use tracing::error;

use crate::context::ServiceContext;

/// Matches every row; used to clear the table through a filtered delete
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Clone)]
pub struct ErrorService {
    ctx: ServiceContext,
}

impl ErrorService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Persist a client error. Severity defaults to `critical`.
    pub async fn log_error(
        &self,
        description: &str,
        page: &str,
        severity: Option<&str>,
        stack_trace: Option<&str>,
    ) -> ApiResponse<ErrorLog> {
        let entry = ErrorLog {
            id: String::new(),
            user_id: self.ctx.user_id().map(str::to_string),
            page: page.to_string(),
            description: description.to_string(),
            stack_trace: stack_trace.map(str::to_string),
            severity: severity.unwrap_or("critical").to_string(),
            created_at: None,
        };
        error!(page, severity = %entry.severity, "client error: {}", description);
        self.ctx
            .run_with_status(201, async {
                Ok(platform::insert_one(self.ctx.db.as_ref(), "error_logs", &entry).await?)
            })
            .await
    }

    /// Newest first, straight from the table
    pub async fn recent(&self, limit: usize) -> ApiResponse<Vec<ErrorLog>> {
        let query = Query::table("error_logs").order("created_at", false).limit(limit);
        self.ctx
            .run(async { Ok(fetch(self.ctx.db.as_ref(), &query).await?) })
            .await
    }

    pub async fn list(&self) -> ApiResponse<Value> {
        self.ctx
            .run(async { Ok(self.ctx.db.rpc("get_admin_errors", json!({})).await?) })
            .await
    }

    pub async fn stats(&self) -> ApiResponse<Value> {
        self.ctx
            .run(async { Ok(self.ctx.db.rpc("get_error_stats", json!({})).await?) })
            .await
    }

    pub async fn delete(&self, id: &str) -> ApiResponse<u64> {
        self.ctx
            .run(async { Ok(self.ctx.db.delete(&Query::table("error_logs").eq("id", id)).await?) })
            .await
    }

    pub async fn clear_all(&self) -> ApiResponse<u64> {
        self.ctx
            .run(async {
                Ok(self
                    .ctx
                    .db
                    .delete(&Query::table("error_logs").neq("id", NIL_UUID))
                    .await?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_log_defaults_to_critical() {
        let (ctx, db, _) = context("u1");
        let response = ErrorService::new(ctx)
            .log_error("Cannot read properties of undefined", "/dashboard", None, None)
            .await;

        assert_eq!(response.status, 201);
        let rows = db.rows("error_logs");
        assert_eq!(rows[0]["severity"], json!("critical"));
        assert_eq!(rows[0]["user_id"], json!("u1"));
        assert!(response.data.unwrap().is_critical());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (ctx, db, _) = context("u1");
        db.seed(
            "error_logs",
            vec![
                json!({"id": "e1", "page": "/a", "description": "x", "severity": "info"}),
                json!({"id": "e2", "page": "/b", "description": "y", "severity": "critical"}),
                json!({"id": "e3", "page": "/c", "description": "z", "severity": "warning"}),
            ],
        );
        let service = ErrorService::new(ctx);

        assert_eq!(service.delete("e1").await.data, Some(1));
        assert_eq!(service.recent(10).await.data.unwrap().len(), 2);
        assert_eq!(service.clear_all().await.data, Some(2));
        assert!(db.rows("error_logs").is_empty());
    }
}
