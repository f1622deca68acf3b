//! Service layer over the hosted platform
//!
//! Every call returns an [`ApiResponse`](tender_types::ApiResponse) and is
//! bounded by [`REQUEST_TIMEOUT`]. Rows are filtered by the signed-in user
//! wherever row-level security would apply.

pub mod admin;
pub mod alerts;
pub mod company;
pub mod context;
pub mod error;
pub mod error_log;
pub mod feedback;
pub mod health;
pub mod revenue;
pub mod templates;
pub mod tenders;

pub use admin::{AdminService, TemplateUpdate, TemplateUpload, UserDetails};
pub use company::{CompanyService, ComplianceStats, DocumentUpload, ProfileUpdate};
pub use context::{CurrentUser, ServiceContext, REQUEST_TIMEOUT};
pub use error::{ServiceError, ServiceResult};
pub use error_log::ErrorService;
pub use feedback::FeedbackService;
pub use health::{HealthStatus, HealthWindow, SystemHealth};
pub use revenue::{MonthlyStatement, RevenueRange, RevenueReport, RevenueSummary};
pub use templates::TemplateService;
pub use tenders::TenderService;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use platform::{MemoryDatabase, MemoryObjectStorage};

    use crate::context::{CurrentUser, ServiceContext};

    pub fn now() -> DateTime<Utc> {
        "2025-06-10T09:00:00Z".parse().unwrap()
    }

    pub fn anonymous() -> (ServiceContext, MemoryDatabase, MemoryObjectStorage) {
        let db = MemoryDatabase::new();
        let storage = MemoryObjectStorage::new();
        let ctx = ServiceContext::new(Arc::new(db.clone()), Arc::new(storage.clone())).at(now());
        (ctx, db, storage)
    }

    pub fn context(user_id: &str) -> (ServiceContext, MemoryDatabase, MemoryObjectStorage) {
        let (ctx, db, storage) = anonymous();
        (ctx.with_user(CurrentUser::new(user_id)), db, storage)
    }
}
