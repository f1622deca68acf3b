//! Bid document templates

use platform::{fetch, Query, TEMPLATES_BUCKET};
use serde_json::json;
use tender_types::{ApiResponse, Template};
use tracing::warn;

use crate::context::ServiceContext;

#[derive(Clone)]
pub struct TemplateService {
    ctx: ServiceContext,
}

impl TemplateService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Templates ordered by code; archived ones only when asked for
    pub async fn list(&self, include_archived: bool) -> ApiResponse<Vec<Template>> {
        let mut query = Query::table("templates").order("code", true);
        if !include_archived {
            query = query.eq("is_active", true);
        }
        self.ctx
            .run(async { Ok(fetch(self.ctx.db.as_ref(), &query).await?) })
            .await
    }

    /// Public URL of the template file. The download counter is bumped
    /// first; a failing counter never blocks the download.
    pub async fn download_url(&self, template: &Template) -> String {
        if let Err(e) = self
            .ctx
            .db
            .rpc("increment_template_download", json!({ "template_id": template.id }))
            .await
        {
            warn!(template_id = %template.id, error = %e, "download counter not incremented");
        }
        self.ctx.storage.public_url(TEMPLATES_BUCKET, &template.file_url)
    }
}
