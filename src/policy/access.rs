//! Plan catalog and feature enforcement.
//!
//! The catalog is consumed by callers deciding what a subscription unlocks;
//! the integrity layer never looks at it.

use crate::protocol::models::SubscriptionPayload;
use crate::GuardError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Features available without a subscription.
pub const FREE_FEATURES: &[&str] = &["dose_log", "weight_log"];

/// A purchasable plan and the features it unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Catalog identifier stored in `planId`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Feature codes unlocked by this plan.
    pub features: Vec<String>,
}

impl Plan {
    /// Build a plan from string slices.
    pub fn new(id: &str, name: &str, features: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Whether the plan unlocks `feature`.
    pub fn includes(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Default catalog: basic, pro and premium.
pub static DEFAULT_CATALOG: Lazy<PlanCatalog> = Lazy::new(|| {
    PlanCatalog::new(vec![
        Plan::new(
            "basic",
            "Basic",
            &["dose_log", "weight_log", "measurements", "charts"],
        ),
        Plan::new(
            "pro",
            "Pro",
            &["dose_log", "weight_log", "measurements", "charts", "export", "community"],
        ),
        Plan::new(
            "premium",
            "Premium",
            &[
                "dose_log",
                "weight_log",
                "measurements",
                "charts",
                "export",
                "community",
                "nutrition_plan",
                "priority_support",
            ],
        ),
    ])
});

/// Plan id to plan lookup.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: HashMap<String, Plan>,
}

impl PlanCatalog {
    /// Build a catalog from plans; later duplicates win.
    pub fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Look up a plan.
    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(plan_id)
    }

    /// Whether a plan id exists.
    pub fn contains(&self, plan_id: &str) -> bool {
        self.plans.contains_key(plan_id)
    }

    /// Plan currently granted by `subscription`, if any.
    pub fn effective_plan(
        &self,
        subscription: Option<&SubscriptionPayload>,
        now: DateTime<Utc>,
    ) -> Option<&Plan> {
        let subscription = subscription.filter(|s| s.grants_access(now))?;
        self.get(subscription.plan_id.as_deref()?)
    }

    /// Whether `feature` is available, falling back to the free tier.
    pub fn has_feature(
        &self,
        subscription: Option<&SubscriptionPayload>,
        feature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match self.effective_plan(subscription, now) {
            Some(plan) => plan.includes(feature),
            None => FREE_FEATURES.contains(&feature),
        }
    }

    /// Check that all required features are available.
    pub fn check_access(
        &self,
        subscription: Option<&SubscriptionPayload>,
        required_features: &[&str],
        now: DateTime<Utc>,
    ) -> Result<(), GuardError> {
        for required in required_features {
            if !self.has_feature(subscription, required, now) {
                return Err(GuardError::EntitlementMissing {
                    code: (*required).to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::SubscriptionStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn subscription(plan: &str, status: SubscriptionStatus) -> SubscriptionPayload {
        SubscriptionPayload {
            plan_id: Some(plan.to_string()),
            start_date: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            expires_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_catalog_plans() {
        assert!(DEFAULT_CATALOG.contains("basic"));
        assert!(DEFAULT_CATALOG.contains("pro"));
        assert!(DEFAULT_CATALOG.contains("premium"));
        assert!(!DEFAULT_CATALOG.contains("enterprise"));
    }

    #[test]
    fn test_free_tier_without_subscription() {
        assert!(DEFAULT_CATALOG.has_feature(None, "dose_log", now()));
        assert!(!DEFAULT_CATALOG.has_feature(None, "export", now()));
    }

    #[test]
    fn test_active_plan_features() {
        let sub = subscription("pro", SubscriptionStatus::Active);
        assert!(DEFAULT_CATALOG.has_feature(Some(&sub), "export", now()));
        assert!(!DEFAULT_CATALOG.has_feature(Some(&sub), "nutrition_plan", now()));
    }

    #[test]
    fn test_expired_plan_falls_back_to_free() {
        let sub = subscription("premium", SubscriptionStatus::Active);
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(!DEFAULT_CATALOG.has_feature(Some(&sub), "nutrition_plan", later));
        assert!(DEFAULT_CATALOG.has_feature(Some(&sub), "weight_log", later));
    }

    #[test]
    fn test_unknown_plan_grants_free_tier_only() {
        let sub = subscription("enterprise", SubscriptionStatus::Active);
        assert!(DEFAULT_CATALOG.effective_plan(Some(&sub), now()).is_none());
        assert!(!DEFAULT_CATALOG.has_feature(Some(&sub), "charts", now()));
    }

    #[test]
    fn test_check_access_reports_missing_code() {
        let sub = subscription("basic", SubscriptionStatus::Trial);
        let result = DEFAULT_CATALOG.check_access(Some(&sub), &["charts", "export"], now());
        assert!(matches!(result, Err(GuardError::EntitlementMissing { code }) if code == "export"));
    }
}
