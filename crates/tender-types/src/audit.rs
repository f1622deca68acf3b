//! Audit log entries and in-app alerts

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions written to `audit_logs` by the platform's own functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ValidationComplete,
    DraftGenerated,
    DraftFallback,
    IngestComplete,
    ReportSent,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ValidationComplete => "VALIDATION_COMPLETE",
            AuditAction::DraftGenerated => "DRAFT_GENERATED",
            AuditAction::DraftFallback => "DRAFT_FALLBACK",
            AuditAction::IngestComplete => "INGEST_COMPLETE",
            AuditAction::ReportSent => "REPORT_SENT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditSeverity {
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

/// A single `audit_logs` row. `action` stays free-form because external
/// callers of the audit endpoint log their own action names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub severity: AuditSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, severity: AuditSeverity, details: Value) -> Self {
        Self {
            actor_id: None,
            tender_id: None,
            action: action.into(),
            details,
            severity,
            ip_address: None,
            created_at: None,
        }
    }

    pub fn for_tender(mut self, tender_id: &str) -> Self {
        self.tender_id = Some(tender_id.to_string());
        self
    }

    pub fn by_actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
}

impl From<AuditSeverity> for AlertPriority {
    fn from(severity: AuditSeverity) -> Self {
        match severity {
            AuditSeverity::Error | AuditSeverity::Critical => AlertPriority::High,
            AuditSeverity::Warn => AlertPriority::Medium,
            AuditSeverity::Info => AlertPriority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_id: Option<String>,
    pub priority: AlertPriority,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(user_id: &str, priority: AlertPriority, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            tender_id: None,
            priority,
            message: message.into(),
            is_read: false,
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_audit_entry_serialization_omits_empty_fields() {
        let entry = AuditEntry::new(
            AuditAction::ValidationComplete.as_str(),
            AuditSeverity::Warn,
            json!({ "score": 50 }),
        )
        .for_tender("t-1");

        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "tender_id": "t-1",
                "action": "VALIDATION_COMPLETE",
                "details": { "score": 50 },
                "severity": "WARN"
            })
        );
    }

    #[test]
    fn test_alert_priority_from_severity() {
        assert_eq!(AlertPriority::from(AuditSeverity::Error), AlertPriority::High);
        assert_eq!(AlertPriority::from(AuditSeverity::Warn), AlertPriority::Medium);
    }

    #[test]
    fn test_severity_defaults_to_info() {
        let entry: AuditEntry = serde_json::from_value(json!({ "action": "LOGIN" })).unwrap();
        assert_eq!(entry.severity, AuditSeverity::Info);
    }
}
