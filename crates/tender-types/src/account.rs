//! Profiles and subscriptions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paid tier resolved from the active subscription's plan name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Standard,
    Pro,
}

impl SubscriptionTier {
    /// Map a free-form plan name (`"Pro Monthly"`, `"enterprise"`, ...) to a tier
    pub fn from_plan_name(plan: Option<&str>) -> Self {
        let plan = plan.unwrap_or_default().to_lowercase();
        if plan.contains("enterprise") || plan.contains("pro") {
            SubscriptionTier::Pro
        } else if plan.contains("standard") {
            SubscriptionTier::Standard
        } else {
            SubscriptionTier::Free
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub tax_reference_number: Option<String>,
    /// Support tier label, e.g. `"Tier 3"`
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub notify_email_tier_support: bool,
    #[serde(default)]
    pub notify_email_critical_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One payment event; revenue reports sum `amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionHistoryEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_from_plan_name() {
        assert_eq!(SubscriptionTier::from_plan_name(Some("Pro Monthly")), SubscriptionTier::Pro);
        assert_eq!(SubscriptionTier::from_plan_name(Some("ENTERPRISE")), SubscriptionTier::Pro);
        assert_eq!(
            SubscriptionTier::from_plan_name(Some("standard")),
            SubscriptionTier::Standard
        );
        assert_eq!(SubscriptionTier::from_plan_name(Some("free")), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::from_plan_name(None), SubscriptionTier::Free);
    }
}
