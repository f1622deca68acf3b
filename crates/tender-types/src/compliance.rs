//! Compliance requirements, documents and per-requirement check rows

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a tender requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCategory {
    Cidb,
    Bbbee,
    MandatoryDoc,
    /// Categories added by newer ingestion code; the comparator skips them
    #[serde(other)]
    Other,
}

/// A requirement extracted from a tender at ingestion time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRequirement {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub tender_id: String,
    pub rule_category: RuleCategory,
    #[serde(default)]
    pub description: String,
    /// `{grade, class}`, `{min_level}`, `{docs: [...]}` or `{doc_type}`
    #[serde(default)]
    pub target_value: Value,
    #[serde(default)]
    pub is_killer: bool,
}

impl ComplianceRequirement {
    pub fn new(
        tender_id: &str,
        rule_category: RuleCategory,
        description: impl Into<String>,
        target_value: Value,
        is_killer: bool,
    ) -> Self {
        Self {
            id: String::new(),
            tender_id: tender_id.to_string(),
            rule_category,
            description: description.into(),
            target_value,
            is_killer,
        }
    }
}

/// Validity of a stored compliance document relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Valid,
    Warning,
    Expired,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Valid => "valid",
            DocumentStatus::Warning => "warning",
            DocumentStatus::Expired => "expired",
        }
    }
}

/// A compliance document uploaded by a bidder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub doc_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Storage path inside the `compliance` bucket
    #[serde(default)]
    pub file_url: Option<String>,
    /// Status as stored on the row (`status`) or computed by the summary view
    #[serde(default, alias = "computed_status")]
    pub status: Option<DocumentStatus>,
    #[serde(default, deserialize_with = "crate::dates::lenient_date")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub issue_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ComplianceDocument {
    pub fn new(user_id: &str, doc_type: &str) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            doc_type: doc_type.to_string(),
            category: None,
            title: None,
            file_name: None,
            file_url: None,
            status: None,
            expiry_date: None,
            issue_date: None,
            reference_number: None,
            metadata: Value::Null,
            created_at: None,
        }
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry_date = Some(expiry);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Read a metadata field as an integer, accepting numbers and numeric strings
    pub fn metadata_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Outcome of one check, as stored in `compliance_checks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
}

/// Row persisted by the validator for each verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub tender_id: String,
    pub requirement_id: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub actual_value: Value,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_category_wire_names() {
        assert_eq!(json!(RuleCategory::MandatoryDoc), json!("MANDATORY_DOC"));
        assert_eq!(json!(RuleCategory::Cidb), json!("CIDB"));
        let parsed: RuleCategory = serde_json::from_value(json!("PRICING")).unwrap();
        assert_eq!(parsed, RuleCategory::Other);
    }

    #[test]
    fn test_document_reads_view_status_alias() {
        let doc: ComplianceDocument = serde_json::from_value(json!({
            "user_id": "u1",
            "doc_type": "cidb_cert",
            "computed_status": "warning",
            "expiry_date": "2026-01-31",
            "metadata": { "grade": "7" }
        }))
        .unwrap();

        assert_eq!(doc.status, Some(DocumentStatus::Warning));
        assert_eq!(doc.metadata_int("grade"), Some(7));
        assert_eq!(doc.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 31));
    }

    #[test]
    fn test_metadata_int_rejects_garbage() {
        let doc = ComplianceDocument::new("u1", "bbbee_cert")
            .with_metadata(json!({ "level": "Non-Compliant" }));
        assert_eq!(doc.metadata_int("level"), None);
        assert_eq!(doc.metadata_int("missing"), None);
    }
}
