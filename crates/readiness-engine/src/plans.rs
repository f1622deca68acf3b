//! Plan labels, feature gates and tender quotas per subscription tier

use serde::Serialize;
use tender_types::SubscriptionTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    UnlimitedTenders,
    DeepAiAnalysis,
    ComplianceAlerts,
    TemplateAccess,
}

/// Display label for any representation of a plan: tier numbers,
/// `"Tier 2"`, legacy names like `"standard"` or `"enterprise"`.
pub fn normalize_plan_label(input: Option<&str>) -> &'static str {
    let s = input.unwrap_or_default().trim().to_lowercase();
    if s.is_empty() || s == "1" || s == "tier 1" || s.contains("free") {
        "Free Plan"
    } else if s == "2" || s == "tier 2" || s.contains("standard") || s.contains("basic") {
        "Basic Plan"
    } else if s == "3" || s == "tier 3" || s.contains("pro") || s.contains("enterprise") {
        "Pro Plan"
    } else {
        "Free Plan"
    }
}

pub fn features(tier: SubscriptionTier) -> &'static [Feature] {
    match tier {
        SubscriptionTier::Free => &[Feature::TemplateAccess],
        SubscriptionTier::Standard => &[Feature::TemplateAccess, Feature::ComplianceAlerts],
        SubscriptionTier::Pro => &[
            Feature::UnlimitedTenders,
            Feature::DeepAiAnalysis,
            Feature::ComplianceAlerts,
            Feature::TemplateAccess,
        ],
    }
}

pub fn has_access(tier: SubscriptionTier, feature: Feature) -> bool {
    features(tier).contains(&feature)
}

/// Active tenders a tier may create per calendar month
pub fn tender_limit(tier: SubscriptionTier) -> u32 {
    match tier {
        SubscriptionTier::Pro => 9999,
        SubscriptionTier::Standard => 20,
        SubscriptionTier::Free => 1,
    }
}

/// Outcome of a quota check before creating a tender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LimitCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Quota decision for a plan given how many active tenders were created this month
pub fn check_tender_limit(plan_name: Option<&str>, created_this_month: u32) -> LimitCheck {
    let tier = SubscriptionTier::from_plan_name(plan_name);
    if tier == SubscriptionTier::Pro {
        return LimitCheck::allowed();
    }

    let limit = tender_limit(tier);
    if created_this_month < limit {
        return LimitCheck::allowed();
    }

    let plan = plan_name.map(str::to_lowercase).unwrap_or_else(|| "free".to_string());
    let upgrade = if tier == SubscriptionTier::Free {
        "Standard"
    } else {
        "Enterprise"
    };
    LimitCheck::denied(format!(
        "You have reached your {} plan limit ({} active tender{}). Upgrade to {} for more.",
        plan,
        limit,
        if limit > 1 { "s" } else { "" },
        upgrade
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plan_label() {
        assert_eq!(normalize_plan_label(None), "Free Plan");
        assert_eq!(normalize_plan_label(Some("Tier 2")), "Basic Plan");
        assert_eq!(normalize_plan_label(Some("standard")), "Basic Plan");
        assert_eq!(normalize_plan_label(Some("3")), "Pro Plan");
        assert_eq!(normalize_plan_label(Some("Enterprise Annual")), "Pro Plan");
        assert_eq!(normalize_plan_label(Some("mystery")), "Free Plan");
    }

    #[test]
    fn test_feature_gate() {
        assert!(has_access(SubscriptionTier::Free, Feature::TemplateAccess));
        assert!(!has_access(SubscriptionTier::Free, Feature::ComplianceAlerts));
        assert!(has_access(SubscriptionTier::Standard, Feature::ComplianceAlerts));
        assert!(!has_access(SubscriptionTier::Standard, Feature::DeepAiAnalysis));
        assert!(has_access(SubscriptionTier::Pro, Feature::UnlimitedTenders));
    }

    #[test]
    fn test_free_plan_allows_one_tender() {
        assert!(check_tender_limit(None, 0).allowed);
        let denied = check_tender_limit(None, 1);
        assert!(!denied.allowed);
        assert_eq!(
            denied.reason.as_deref(),
            Some("You have reached your free plan limit (1 active tender). Upgrade to Standard for more.")
        );
    }

    #[test]
    fn test_standard_and_pro_limits() {
        assert!(check_tender_limit(Some("Standard"), 19).allowed);
        let denied = check_tender_limit(Some("Standard"), 20);
        assert!(denied.reason.unwrap().contains("Upgrade to Enterprise"));
        assert!(check_tender_limit(Some("Pro"), 10_000).allowed);
    }
}
