use chrono::NaiveDate;
use serde_json::json;
use tender_types::{ComplianceDocument, ComplianceRequirement, DocumentStatus};

use super::find_best_document;
use crate::patterns::{field_text, leading_int, CIDB_CERT, DEFAULT_CIDB_TARGET_GRADE};
use crate::report::Verdict;

/// Grade check against the bidder's CIDB certificate.
///
/// Fails when the certificate is missing, expired, or graded below target.
/// A class mismatch is reported as a warning only.
pub fn check_cidb(
    requirement: &ComplianceRequirement,
    docs: &[ComplianceDocument],
    today: NaiveDate,
) -> Verdict {
    let target = &requirement.target_value;
    let target_grade = target
        .get("grade")
        .and_then(leading_int)
        .unwrap_or(DEFAULT_CIDB_TARGET_GRADE);
    let target_class = target.get("class").and_then(field_text);

    let id = requirement.id.as_str();
    let name = requirement.description.as_str();
    let killer = requirement.is_killer;

    let by_grade = |d: &ComplianceDocument| d.metadata.get("grade").and_then(leading_int).unwrap_or(0);
    let Some((doc, status)) = find_best_document(docs, CIDB_CERT, today, by_grade) else {
        return Verdict::fail(id, name, killer, "Missing CIDB Certificate")
            .with_actual(json!({ "found": false }));
    };

    let user_grade = by_grade(doc);
    let user_class = doc.metadata_str("class").map(str::trim).map(str::to_string);
    let actual = json!({ "grade": user_grade, "class": user_class, "status": status.as_str() });

    if status == DocumentStatus::Expired {
        return Verdict::fail(id, name, killer, "CIDB Expired").with_actual(actual);
    }

    if user_grade < target_grade {
        return Verdict::fail(
            id,
            name,
            killer,
            format!("Grade {} is too low (Need {})", user_grade, target_grade),
        )
        .with_actual(actual);
    }

    let mut verdict = Verdict::pass(id, name, killer).with_actual(actual);
    match (&target_class, &user_class) {
        (Some(need), Some(have)) if !need.eq_ignore_ascii_case(have) => {
            verdict = verdict.with_warning(format!("Class mismatch (Need {}, found {})", need, have));
        }
        (Some(need), None) => {
            verdict = verdict.with_warning(format!("Class not recorded (Need {})", need));
        }
        _ if status == DocumentStatus::Warning => {
            verdict = verdict.with_warning("Expiring soon");
        }
        _ => {}
    }
    verdict
}
