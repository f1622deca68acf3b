//! Tender rows and readiness values

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compliance::ComplianceRequirement;

/// Lifecycle of a tender, plus the validator's two outcome states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderStatus {
    Analyzing,
    Draft,
    Ready,
    Submitted,
    Archived,
    Compliant,
    NonCompliant,
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Analyzing => "ANALYZING",
            TenderStatus::Draft => "DRAFT",
            TenderStatus::Ready => "READY",
            TenderStatus::Submitted => "SUBMITTED",
            TenderStatus::Archived => "ARCHIVED",
            TenderStatus::Compliant => "COMPLIANT",
            TenderStatus::NonCompliant => "NON_COMPLIANT",
        }
    }
}

/// Traffic-light readiness of a tender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Readiness {
    Red,
    Amber,
    Green,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Red => "RED",
            Readiness::Amber => "AMBER",
            Readiness::Green => "GREEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "crate::dates::lenient_date")]
    pub closing_date: Option<NaiveDate>,
    pub status: TenderStatus,
    #[serde(default)]
    pub compliance_score: u8,
    pub readiness: Readiness,
    #[serde(default)]
    pub has_rated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Present when the row was selected together with its requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_requirements: Option<Vec<ComplianceRequirement>>,
}

/// Fields supplied when a bidder registers a tender by hand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualTenderData {
    pub title: String,
    pub client_name: String,
    pub closing_date: String,
    #[serde(default)]
    pub requirements: ManualRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualRequirements {
    #[serde(default)]
    pub cidb_grade: Option<String>,
    #[serde(default)]
    pub cidb_class: Option<String>,
    #[serde(default)]
    pub min_bbbee_level: Option<String>,
    #[serde(default)]
    pub mandatory_docs: bool,
}

/// Text extracted from a tender pack at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderDocument {
    pub tender_id: String,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub metadata: Value,
}
