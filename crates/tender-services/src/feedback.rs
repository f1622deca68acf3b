//! User ratings and the admin feedback views

use platform::Query;
use serde_json::{json, Value};
use tender_types::{ApiResponse, UserFeedback};
use tracing::{info, warn};

use crate::context::ServiceContext;
use crate::error::ServiceError;

#[derive(Clone)]
pub struct FeedbackService {
    ctx: ServiceContext,
}

impl FeedbackService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Record a rating and mark the tender as rated
    pub async fn submit(&self, tender_id: Option<&str>, rating: u8, message: &str) -> ApiResponse<UserFeedback> {
        self.ctx
            .run_with_status(201, async {
                let user = self.ctx.user()?;
                if !(1..=5).contains(&rating) {
                    return Err(ServiceError::Invalid("Rating must be between 1 and 5".into()));
                }
                let feedback = UserFeedback {
                    id: String::new(),
                    user_id: user.id.clone(),
                    tender_id: tender_id.map(str::to_string),
                    rating,
                    message: message.trim().to_string(),
                    created_at: None,
                };
                let stored = platform::insert_one(self.ctx.db.as_ref(), "user_feedback", &feedback).await?;
                info!(rating, "feedback submitted");

                if let Some(tender_id) = tender_id {
                    if let Err(e) = self
                        .ctx
                        .db
                        .update(&Query::table("tenders").eq("id", tender_id), json!({ "has_rated": true }))
                        .await
                    {
                        warn!(tender_id, error = %e, "could not mark tender as rated");
                    }
                }
                Ok(stored)
            })
            .await
    }

    pub async fn stats(&self) -> ApiResponse<Value> {
        self.rpc("get_admin_feedback_stats").await
    }

    pub async fn history(&self) -> ApiResponse<Value> {
        self.rpc("get_admin_feedback_history").await
    }

    pub async fn total_users(&self) -> ApiResponse<Value> {
        self.rpc("get_total_users_count").await
    }

    async fn rpc(&self, function: &str) -> ApiResponse<Value> {
        self.ctx
            .run(async { Ok(self.ctx.db.rpc(function, json!({})).await?) })
            .await
    }
}
