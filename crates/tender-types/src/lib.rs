pub mod account;
pub mod admin;
pub mod audit;
pub mod compliance;
pub mod dates;
pub mod drafts;
pub mod envelope;
pub mod reply;
pub mod tender;

pub use account::{Profile, Subscription, SubscriptionHistoryEntry, SubscriptionTier};
pub use admin::{BroadcastPriority, ErrorLog, SystemMessage, Template, UserFeedback};
pub use audit::{Alert, AlertPriority, AuditAction, AuditEntry, AuditSeverity};
pub use compliance::{
    CheckStatus, ComplianceCheck, ComplianceDocument, ComplianceRequirement, DocumentStatus,
    RuleCategory,
};
pub use drafts::{AiDraft, DraftStatus};
pub use envelope::{ApiResponse, ErrorBody, FunctionResult};
pub use tender::{ManualRequirements, ManualTenderData, Readiness, Tender, TenderDocument, TenderStatus};
