use chrono::NaiveDate;
use serde_json::{json, Value};
use tender_types::{ComplianceDocument, ComplianceRequirement, DocumentStatus};

use super::find_best_document;
use crate::patterns::{leading_int, BBBEE_CERT, DEFAULT_BBBEE_LEVEL};
use crate::report::Verdict;

/// B-BBEE level check. Level 1 is best, so the bidder passes when their
/// level is at or below the maximum the tender allows.
pub fn check_bbbee(
    requirement: &ComplianceRequirement,
    docs: &[ComplianceDocument],
    today: NaiveDate,
) -> Verdict {
    let max_level = requirement
        .target_value
        .get("min_level")
        .and_then(leading_int)
        .unwrap_or(DEFAULT_BBBEE_LEVEL);

    let id = requirement.id.as_str();
    let name = requirement.description.as_str();
    let killer = requirement.is_killer;

    let by_level = |d: &ComplianceDocument| recorded_level(d).map_or(i64::MIN, |level| -level);
    let Some((doc, status)) = find_best_document(docs, BBBEE_CERT, today, by_level) else {
        return Verdict::fail(id, name, killer, "Missing B-BBEE Certificate")
            .with_actual(json!({ "found": false }));
    };

    let raw_level = doc.metadata.get("level").cloned().unwrap_or(Value::Null);
    let actual = json!({ "level": raw_level, "status": status.as_str() });

    if status == DocumentStatus::Expired {
        return Verdict::fail(id, name, killer, "B-BBEE Expired").with_actual(actual);
    }

    match recorded_level(doc) {
        Some(level) if level <= max_level => {
            let verdict = Verdict::pass(id, name, killer).with_actual(actual);
            if status == DocumentStatus::Warning {
                verdict.with_warning("Expiring soon")
            } else {
                verdict
            }
        }
        Some(level) => Verdict::fail(
            id,
            name,
            killer,
            format!("Level {} is too low (Need {} or better)", level, max_level),
        )
        .with_actual(actual),
        None => Verdict::fail(
            id,
            name,
            killer,
            format!(
                "{} does not meet Level {}",
                raw_level.as_str().unwrap_or("Unrecognised level"),
                max_level
            ),
        )
        .with_actual(actual),
    }
}

/// An unrecorded level reads as the weakest compliant level; anything
/// non-numeric (e.g. "Non-Compliant") has no level at all.
fn recorded_level(doc: &ComplianceDocument) -> Option<i64> {
    match doc.metadata.get("level") {
        None | Some(Value::Null) => Some(DEFAULT_BBBEE_LEVEL),
        Some(other) => leading_int(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tender_types::RuleCategory;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn requirement(max: i64) -> ComplianceRequirement {
        ComplianceRequirement::new(
            "t1",
            RuleCategory::Bbbee,
            format!("Minimum B-BBEE Level {}", max),
            json!({ "min_level": max }),
            false,
        )
    }

    fn cert(level: Value) -> ComplianceDocument {
        ComplianceDocument::new("u1", BBBEE_CERT)
            .with_metadata(json!({ "level": level }))
            .with_expiry(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
    }

    #[test]
    fn test_bbbee_better_level_passes() {
        assert!(check_bbbee(&requirement(4), &[cert(json!("2"))], today()).passed);
        assert!(check_bbbee(&requirement(4), &[cert(json!(4))], today()).passed);
    }

    #[test]
    fn test_bbbee_worse_level_fails() {
        let v = check_bbbee(&requirement(4), &[cert(json!(5))], today());
        assert!(!v.passed);
        assert_eq!(v.reason.as_deref(), Some("Level 5 is too low (Need 4 or better)"));
    }

    #[test]
    fn test_bbbee_missing_level_reads_as_eight() {
        let doc = ComplianceDocument::new("u1", BBBEE_CERT)
            .with_expiry(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        assert!(check_bbbee(&requirement(8), &[doc.clone()], today()).passed);
        assert!(!check_bbbee(&requirement(7), &[doc], today()).passed);
    }

    #[test]
    fn test_bbbee_non_compliant_label_fails() {
        let v = check_bbbee(&requirement(8), &[cert(json!("Non-Compliant"))], today());
        assert!(!v.passed);
    }

    #[test]
    fn test_bbbee_missing_or_expired_fails() {
        assert!(!check_bbbee(&requirement(4), &[], today()).passed);
        let expired = cert(json!(1)).with_expiry(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let v = check_bbbee(&requirement(4), &[expired], today());
        assert_eq!(v.reason.as_deref(), Some("B-BBEE Expired"));
    }

    #[test]
    fn test_bbbee_grades_the_best_unexpired_level() {
        let soon = cert(json!(2)).with_expiry(NaiveDate::from_ymd_opt(2025, 7, 15).unwrap());
        let lapsed = cert(json!(1)).with_expiry(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let docs = [cert(json!("Non-Compliant")), cert(json!(6)), soon, lapsed];

        let v = check_bbbee(&requirement(4), &docs, today());
        assert!(v.passed, "{:?}", v.reason);
        assert_eq!(v.warning.as_deref(), Some("Expiring soon"));
    }

    #[test]
    fn test_bbbee_target_defaults_to_level_eight() {
        let req = ComplianceRequirement::new("t1", RuleCategory::Bbbee, "B-BBEE", json!({}), false);
        assert!(check_bbbee(&req, &[cert(json!(8))], today()).passed);
    }
}
