//! Generated tender-response drafts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftStatus {
    /// Passed every gate, waiting for a human reviewer
    ReviewPending,
    /// Stored, but too many `[[REQUIRES INPUT` markers to be useful as-is
    IncompleteData,
    /// The fallback template; the bidder writes the section by hand
    DraftManualEdit,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::ReviewPending => "REVIEW_PENDING",
            DraftStatus::IncompleteData => "INCOMPLETE_DATA",
            DraftStatus::DraftManualEdit => "DRAFT_MANUAL_EDIT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiDraft {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub tender_id: String,
    pub section_name: String,
    pub version: u32,
    pub content_markdown: String,
    pub status: DraftStatus,
    /// Gate notes, e.g. `"Safety Failure: ..."`
    #[serde(default)]
    pub user_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
