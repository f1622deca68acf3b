pub mod patterns;
pub mod plans;
pub mod report;
pub mod rules;
pub mod status;
pub mod taxonomy;
pub mod validation;

use chrono::{NaiveDate, Utc};
use tender_types::{ComplianceDocument, ComplianceRequirement, RuleCategory};

pub use report::{ReadinessReport, Verdict};
pub use status::{document_status, EXPIRY_WARNING_DAYS};

/// ReadinessEngine entry point
pub struct ReadinessEngine;

impl ReadinessEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compare a tender's requirements against the bidder's documents as of `today`.
    /// Pure: calling it twice with the same inputs gives the same report.
    pub fn evaluate(
        &self,
        requirements: &[ComplianceRequirement],
        documents: &[ComplianceDocument],
        today: NaiveDate,
    ) -> ReadinessReport {
        ReadinessReport::from_verdicts(self.verdicts(requirements, documents, today))
    }

    pub fn evaluate_now(
        &self,
        requirements: &[ComplianceRequirement],
        documents: &[ComplianceDocument],
    ) -> ReadinessReport {
        self.evaluate(requirements, documents, Utc::now().date_naive())
    }

    /// Verdicts in requirement order; list requirements expand in place
    pub fn verdicts(
        &self,
        requirements: &[ComplianceRequirement],
        documents: &[ComplianceDocument],
        today: NaiveDate,
    ) -> Vec<Verdict> {
        let mut verdicts = Vec::new();
        for requirement in requirements {
            match requirement.rule_category {
                RuleCategory::Cidb => {
                    verdicts.push(rules::cidb::check_cidb(requirement, documents, today))
                }
                RuleCategory::Bbbee => {
                    verdicts.push(rules::bbbee::check_bbbee(requirement, documents, today))
                }
                RuleCategory::MandatoryDoc => verdicts.extend(
                    rules::mandatory::check_mandatory_docs(requirement, documents, today),
                ),
                RuleCategory::Other => {}
            }
        }
        verdicts
    }
}

impl Default for ReadinessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tender_types::Readiness;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn far_future() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    fn cidb_requirement(grade: i64) -> ComplianceRequirement {
        let mut req = ComplianceRequirement::new(
            "t1",
            RuleCategory::Cidb,
            format!("Minimum CIDB Grading of {}GB", grade),
            json!({ "grade": grade, "class": "GB" }),
            true,
        );
        req.id = "req-cidb".into();
        req
    }

    fn bbbee_requirement(max: i64) -> ComplianceRequirement {
        let mut req = ComplianceRequirement::new(
            "t1",
            RuleCategory::Bbbee,
            format!("Minimum B-BBEE Level {}", max),
            json!({ "min_level": max }),
            false,
        );
        req.id = "req-bbbee".into();
        req
    }

    fn cidb_doc(grade: i64) -> ComplianceDocument {
        ComplianceDocument::new("u1", "cidb_cert")
            .with_metadata(json!({ "grade": grade.to_string(), "class": "GB" }))
            .with_expiry(far_future())
    }

    fn bbbee_doc(level: i64) -> ComplianceDocument {
        ComplianceDocument::new("u1", "bbbee_cert")
            .with_metadata(json!({ "level": level }))
            .with_expiry(far_future())
    }

    #[test]
    fn test_engine_scenario_upgrade_turns_green() {
        let engine = ReadinessEngine::new();
        let requirements = vec![cidb_requirement(6), bbbee_requirement(4)];

        let report = engine.evaluate(&requirements, &[cidb_doc(4), bbbee_doc(2)], today());
        assert_eq!(report.readiness, Readiness::Red);
        assert_eq!(report.score, 50);
        assert!(!report.is_ready);

        let report = engine.evaluate(&requirements, &[cidb_doc(7), bbbee_doc(2)], today());
        assert_eq!(report.readiness, Readiness::Green);
        assert_eq!(report.score, 100);
        assert!(report.is_ready);
    }

    #[test]
    fn test_engine_non_killer_failure_is_amber() {
        let engine = ReadinessEngine::new();
        let requirements = vec![cidb_requirement(6), bbbee_requirement(2)];
        let report = engine.evaluate(&requirements, &[cidb_doc(6), bbbee_doc(5)], today());

        assert_eq!(report.score, 50);
        assert_eq!(report.readiness, Readiness::Amber);
    }

    #[test]
    fn test_engine_no_requirements() {
        let report = ReadinessEngine::new().evaluate(&[], &[cidb_doc(9)], today());
        assert_eq!(report.score, 0);
        assert!(!report.is_ready);
    }

    #[test]
    fn test_engine_skips_unknown_categories() {
        let req = ComplianceRequirement::new("t1", RuleCategory::Other, "Pricing", json!({}), true);
        let report = ReadinessEngine::new().evaluate(&[req], &[], today());
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_engine_is_idempotent() {
        let engine = ReadinessEngine::default();
        let requirements = vec![cidb_requirement(6), bbbee_requirement(4)];
        let docs = vec![cidb_doc(5), bbbee_doc(4)];
        assert_eq!(
            engine.evaluate(&requirements, &docs, today()),
            engine.evaluate(&requirements, &docs, today())
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn cidb_passes_iff_grade_meets_target(target in 1i64..=9, grade in 0i64..=9) {
            let report = ReadinessEngine::new().evaluate(&[cidb_requirement(target)], &[cidb_doc(grade)], today());
            prop_assert_eq!(report.checks[0].passed, grade >= target);
        }

        #[test]
        fn bbbee_passes_iff_level_within_max(max in 1i64..=8, level in 1i64..=8) {
            let report = ReadinessEngine::new().evaluate(&[bbbee_requirement(max)], &[bbbee_doc(level)], today());
            prop_assert_eq!(report.checks[0].passed, level <= max);
        }

        #[test]
        fn expired_documents_never_pass(grade in 1i64..=9, days_ago in 1i64..2000) {
            let doc = cidb_doc(grade).with_expiry(today() - chrono::Duration::days(days_ago));
            let report = ReadinessEngine::new().evaluate(&[cidb_requirement(1)], &[doc], today());
            prop_assert!(!report.checks[0].passed);
            prop_assert_eq!(report.readiness, Readiness::Red);
        }
    }
}
