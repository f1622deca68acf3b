use chrono::NaiveDate;
use serde_json::{json, Value};
use tender_types::{ComplianceDocument, ComplianceRequirement, DocumentStatus};

use super::find_document;
use crate::patterns::doc_label;
use crate::report::Verdict;

/// One verdict per required document key. Accepts both `{docs: [...]}` and
/// the single-document `{doc_type}` form written by ingestion.
pub fn check_mandatory_docs(
    requirement: &ComplianceRequirement,
    docs: &[ComplianceDocument],
    today: NaiveDate,
) -> Vec<Verdict> {
    required_keys(&requirement.target_value)
        .into_iter()
        .map(|key| check_document(requirement, &key, docs, today))
        .collect()
}

fn required_keys(target: &Value) -> Vec<String> {
    if let Some(list) = target.get("docs").and_then(Value::as_array) {
        return list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    target
        .get("doc_type")
        .and_then(Value::as_str)
        .map(|key| vec![key.to_string()])
        .unwrap_or_default()
}

fn check_document(
    requirement: &ComplianceRequirement,
    key: &str,
    docs: &[ComplianceDocument],
    today: NaiveDate,
) -> Verdict {
    let id = requirement.id.as_str();
    let killer = requirement.is_killer;
    let name = doc_label(key);

    match find_document(docs, key, today) {
        None => Verdict::fail(id, name, killer, "Missing document")
            .with_actual(json!({ "doc_type": key, "found": false })),
        Some((doc, status)) => {
            let actual = json!({
                "doc_type": key,
                "found": true,
                "expiry": doc.expiry_date,
                "status": status.as_str(),
            });
            match status {
                DocumentStatus::Expired => {
                    Verdict::fail(id, name, killer, "Document expired").with_actual(actual)
                }
                DocumentStatus::Warning => Verdict::pass(id, name, killer)
                    .with_warning("Expiring soon")
                    .with_actual(actual),
                DocumentStatus::Valid => Verdict::pass(id, name, killer).with_actual(actual),
            }
        }
    }
}
