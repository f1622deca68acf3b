//! Verdicts, score and readiness aggregation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tender_types::{CheckStatus, ComplianceCheck, Readiness};

/// Pass/fail outcome for one requirement (or one document of a list requirement)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub requirement_id: String,
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub is_killer: bool,
    /// What was observed on the bidder's side
    #[serde(default)]
    pub actual_value: Value,
}

impl Verdict {
    pub fn pass(requirement_id: &str, name: impl Into<String>, is_killer: bool) -> Self {
        Self {
            requirement_id: requirement_id.to_string(),
            name: name.into(),
            passed: true,
            reason: None,
            warning: None,
            is_killer,
            actual_value: Value::Null,
        }
    }

    pub fn fail(
        requirement_id: &str,
        name: impl Into<String>,
        is_killer: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
            ..Self::pass(requirement_id, name, is_killer)
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_actual(mut self, actual: Value) -> Self {
        self.actual_value = actual;
        self
    }

    /// Row for `compliance_checks`
    pub fn to_check(&self, tender_id: &str) -> ComplianceCheck {
        ComplianceCheck {
            tender_id: tender_id.to_string(),
            requirement_id: self.requirement_id.clone(),
            status: if self.passed {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            actual_value: self.actual_value.clone(),
            failure_reason: self.reason.clone(),
        }
    }
}

/// Aggregate result of comparing one tender against one document set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub checks: Vec<Verdict>,
    pub passed: usize,
    pub total: usize,
    pub score: u8,
    pub readiness: Readiness,
    pub killer_failed: bool,
    pub is_ready: bool,
}

impl ReadinessReport {
    pub fn from_verdicts(checks: Vec<Verdict>) -> Self {
        let total = checks.len();
        let passed = checks.iter().filter(|v| v.passed).count();
        let killer_failed = checks.iter().any(|v| v.is_killer && !v.passed);
        let score = score(passed, total);
        let is_ready = total > 0 && score == 100;

        Self {
            checks,
            passed,
            total,
            score,
            readiness: readiness(score, killer_failed, total),
            killer_failed,
            is_ready,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.checks.iter().filter(|v| !v.passed)
    }
}

/// `round(passed / total * 100)` with halves rounded up; 0 when there is nothing to check
pub fn score(passed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let passed = passed.min(total);
    ((200 * passed + total) / (2 * total)) as u8
}

/// RED on any killer failure, else GREEN only at a perfect score.
/// An empty verdict set is never GREEN.
pub fn readiness(score: u8, killer_failed: bool, total: usize) -> Readiness {
    if killer_failed {
        Readiness::Red
    } else if total == 0 || score < 100 {
        Readiness::Amber
    } else {
        Readiness::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_score_rounds_half_up() {
        assert_eq!(score(1, 8), 13);
        assert_eq!(score(1, 3), 33);
        assert_eq!(score(2, 3), 67);
        assert_eq!(score(3, 3), 100);
        assert_eq!(score(0, 0), 0);
    }

    #[test]
    fn test_empty_report_is_not_ready() {
        let report = ReadinessReport::from_verdicts(vec![]);
        assert_eq!(report.score, 0);
        assert!(!report.is_ready);
        assert_eq!(report.readiness, Readiness::Amber);
    }

    #[test]
    fn test_killer_failure_is_red_even_when_score_high() {
        let mut checks: Vec<Verdict> = (0..9).map(|i| Verdict::pass(&i.to_string(), "doc", false)).collect();
        checks.push(Verdict::fail("k", "CIDB", true, "Missing CIDB Certificate"));
        let report = ReadinessReport::from_verdicts(checks);
        assert_eq!(report.score, 90);
        assert_eq!(report.readiness, Readiness::Red);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_verdict_to_check_row() {
        let check = Verdict::fail("r1", "Tax Clearance", true, "Document missing").to_check("t1");
        assert_eq!(check.status, CheckStatus::Fail);
        assert_eq!(check.failure_reason.as_deref(), Some("Document missing"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn score_is_nearest_percentage(total in 1usize..500, passed_ratio in 0.0f64..=1.0) {
            let passed = ((total as f64) * passed_ratio).floor() as usize;
            let exact = passed as f64 * 100.0 / total as f64;
            let got = score(passed, total) as f64;
            prop_assert!((got - exact).abs() <= 0.5 + 1e-9);
            prop_assert!(got <= 100.0);
            if passed == total {
                prop_assert_eq!(score(passed, total), 100);
            }
        }

        #[test]
        fn readiness_follows_killer_and_score(score_value in 0u8..=100, killer in any::<bool>(), total in 1usize..50) {
            let r = readiness(score_value, killer, total);
            if killer {
                prop_assert_eq!(r, Readiness::Red);
            } else if score_value < 100 {
                prop_assert_eq!(r, Readiness::Amber);
            } else {
                prop_assert_eq!(r, Readiness::Green);
            }
        }
    }
}
