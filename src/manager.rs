//! Subscription Manager - the entitlement-changing API consumers call.
//!
//! The `SubscriptionManager` sits where UI hooks would:
//! - Rate-limited subscribe / trial / cancel transitions
//! - Provider-driven updates with local reference checks
//! - Current subscription with errors downgraded to "no subscription"

use crate::clock::Clock;
use crate::crypto::freshness::{check_period, MAX_PERIOD_DAYS};
use crate::guard::SubscriptionGuard;
use crate::policy::access::{PlanCatalog, DEFAULT_CATALOG};
use crate::policy::rate_limit::{ACTION_CANCEL, ACTION_SUBSCRIBE, ACTION_TRIAL};
use crate::protocol::models::{
    BillingPeriod, SignedSubscription, SubscriptionPayload, SubscriptionStatus,
};
use crate::GuardError;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Length of the one-time free trial.
pub const TRIAL_DAYS: i64 = 7;

/// Length of a yearly period; kept at 365 days so leap years stay in bounds.
pub const YEARLY_PERIOD_DAYS: i64 = 365;

/// References issued by the payment provider at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    /// `sub_<epoch-ms>`.
    pub subscription_ref: String,
    /// `cus_<epoch-ms>`.
    pub customer_ref: String,
}

/// Persisted one-time trial marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialMarker {
    /// Whether the trial was consumed.
    pub used: bool,
    /// When it was consumed, epoch ms.
    pub timestamp: i64,
}

/// Main subscription manager.
///
/// Create one instance per session and reuse it; its guard carries the
/// session's tamper counter and rate-limit ledger.
pub struct SubscriptionManager {
    guard: SubscriptionGuard,
    catalog: PlanCatalog,
}

impl SubscriptionManager {
    /// Create a manager using the default plan catalog.
    pub fn new(guard: SubscriptionGuard) -> Self {
        Self::with_catalog(guard, DEFAULT_CATALOG.clone())
    }

    /// Create a manager with a caller-provided plan catalog.
    pub fn with_catalog(guard: SubscriptionGuard, catalog: PlanCatalog) -> Self {
        Self { guard, catalog }
    }

    /// Start a paid subscription after checkout.
    ///
    /// # Errors
    /// - `RateLimitExceeded` - too many subscribe attempts this hour
    /// - `ExternalRefInvalid` - receipt references are implausible
    /// - `InvalidSubscription` - unknown plan
    pub fn subscribe(
        &self,
        plan_id: &str,
        billing_period: BillingPeriod,
        receipt: &ProviderReceipt,
    ) -> Result<SubscriptionPayload, GuardError> {
        self.guard.enforce_rate_limit(ACTION_SUBSCRIBE)?;
        self.require_plan(plan_id)?;
        self.guard
            .validate_with_external_provider(&receipt.subscription_ref, &receipt.customer_ref)?;

        let now = self.guard.clock().now_utc();
        let payload = SubscriptionPayload {
            plan_id: Some(plan_id.to_string()),
            start_date: Some(now),
            expires_at: Some(period_end(now, billing_period)?),
            status: SubscriptionStatus::Active,
            external_subscription_ref: Some(receipt.subscription_ref.clone()),
            external_customer_ref: Some(receipt.customer_ref.clone()),
            billing_period: Some(billing_period),
        };

        self.persist(&payload)?;
        info!(plan_id, ?billing_period, "subscription activated");
        Ok(payload)
    }

    /// Start the one-time free trial of a plan.
    ///
    /// # Errors
    /// - `RateLimitExceeded` - a trial was started within the last 30 days
    /// - `TrialAlreadyUsed` - the persisted trial marker is set
    /// - `InvalidSubscription` - unknown plan, or a subscription still grants access
    pub fn start_trial(&self, plan_id: &str) -> Result<SubscriptionPayload, GuardError> {
        self.guard.enforce_rate_limit(ACTION_TRIAL)?;
        self.require_plan(plan_id)?;

        if self.trial_marker()?.is_some_and(|m| m.used) {
            return Err(GuardError::TrialAlreadyUsed);
        }

        let now = self.guard.clock().now_utc();
        if let Some(current) = self.current_subscription().filter(|s| s.grants_access(now)) {
            return Err(GuardError::InvalidSubscription(format!(
                "a {:?} subscription is already in effect",
                current.status
            )));
        }

        let payload = SubscriptionPayload {
            plan_id: Some(plan_id.to_string()),
            start_date: Some(now),
            expires_at: Some(now + Duration::days(TRIAL_DAYS)),
            status: SubscriptionStatus::Trial,
            ..Default::default()
        };

        self.persist(&payload)?;

        let marker = TrialMarker {
            used: true,
            timestamp: now.timestamp_millis(),
        };
        let marker_json = serde_json::to_string(&marker)
            .map_err(|e| GuardError::Serialization(format!("Failed to serialize trial marker: {}", e)))?;
        self.guard
            .storage()
            .set(&self.guard.config().trial_key, &marker_json)?;

        info!(plan_id, "trial started");
        Ok(payload)
    }

    /// Cancel the current subscription; access continues until `expiresAt`.
    ///
    /// # Errors
    /// - `RateLimitExceeded` - more than two cancellations today
    /// - `InvalidSubscription` - nothing active or on trial to cancel
    /// - any retrieval error from the guard
    pub fn cancel_subscription(&self) -> Result<SubscriptionPayload, GuardError> {
        self.guard.enforce_rate_limit(ACTION_CANCEL)?;

        let key = self.guard.storage_key();
        let mut payload = self
            .guard
            .secure_retrieve_as::<SignedSubscription>(&key)?
            .map(|signed| signed.subscription)
            .ok_or_else(|| GuardError::InvalidSubscription("no subscription to cancel".to_string()))?;

        let now = self.guard.clock().now_utc();
        match payload.effective_status(now) {
            SubscriptionStatus::Active | SubscriptionStatus::Trial => {}
            other => {
                return Err(GuardError::InvalidSubscription(format!(
                    "cannot cancel a subscription in status {:?}",
                    other
                )))
            }
        }

        payload.status = SubscriptionStatus::Cancelled;
        self.persist(&payload)?;
        info!("subscription cancelled");
        Ok(payload)
    }

    /// Replace the local record with one reported by the payment provider.
    ///
    /// # Errors
    /// - `ExternalRefInvalid` - references missing or implausible
    /// - `InvalidSubscription` - record invariants violated, or `expiresAt`
    ///   too far ahead to pass verification on the next read
    pub fn update_from_external(
        &self,
        payload: &SubscriptionPayload,
    ) -> Result<(), GuardError> {
        let (Some(sub_ref), Some(cus_ref)) = (
            payload.external_subscription_ref.as_deref(),
            payload.external_customer_ref.as_deref(),
        ) else {
            return Err(GuardError::ExternalRefInvalid(
                "provider update lacks subscription or customer reference".to_string(),
            ));
        };
        self.guard.validate_with_external_provider(sub_ref, cus_ref)?;

        self.persist(payload)?;
        info!(status = ?payload.status, "subscription updated from provider");
        Ok(())
    }

    /// Current verified subscription, if any.
    ///
    /// Every retrieval failure (lockout, tampering, storage) is logged and
    /// downgraded to `None`. Records past `expiresAt` report `Expired`.
    pub fn current_subscription(&self) -> Option<SubscriptionPayload> {
        let key = self.guard.storage_key();
        match self.guard.secure_retrieve_as::<SignedSubscription>(&key) {
            Ok(Some(signed)) => {
                let mut subscription = signed.subscription;
                subscription.status = subscription.effective_status(self.now());
                Some(subscription)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "no valid subscription");
                None
            }
        }
    }

    /// Whether the current subscription unlocks `feature`.
    pub fn has_feature(&self, feature: &str) -> bool {
        let current = self.current_subscription();
        self.catalog.has_feature(current.as_ref(), feature, self.now())
    }

    /// Require every feature in `required_features`.
    ///
    /// # Errors
    /// `EntitlementMissing` naming the first feature not unlocked.
    pub fn check_access(&self, required_features: &[&str]) -> Result<(), GuardError> {
        let current = self.current_subscription();
        self.catalog
            .check_access(current.as_ref(), required_features, self.now())
    }

    /// Whether the one-time trial has been used.
    pub fn trial_used(&self) -> bool {
        matches!(self.trial_marker(), Ok(Some(TrialMarker { used: true, .. })))
    }

    /// Remove the stored subscription (logout).
    pub fn clear(&self) -> Result<(), GuardError> {
        self.guard.clear(&self.guard.storage_key())
    }

    /// The underlying guard.
    pub fn guard(&self) -> &SubscriptionGuard {
        &self.guard
    }

    /// The plan catalog in use.
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    fn now(&self) -> DateTime<Utc> {
        self.guard.clock().now_utc()
    }

    fn require_plan(&self, plan_id: &str) -> Result<(), GuardError> {
        if !self.catalog.contains(plan_id) {
            return Err(GuardError::InvalidSubscription(format!(
                "unknown plan '{}'",
                plan_id
            )));
        }
        Ok(())
    }

    /// Validate and store. Records the verifier would reject on the next
    /// read are refused here, since such a read counts as tampering.
    fn persist(&self, payload: &SubscriptionPayload) -> Result<(), GuardError> {
        payload.validate()?;
        if let Some(expires_at) = payload.expires_at {
            check_period(self.guard.clock().now_millis(), expires_at).map_err(|_| {
                GuardError::InvalidSubscription(format!(
                    "expiresAt is more than {} days from now",
                    MAX_PERIOD_DAYS
                ))
            })?;
        }
        self.guard.secure_store(&self.guard.storage_key(), payload)
    }

    fn trial_marker(&self) -> Result<Option<TrialMarker>, GuardError> {
        let Some(raw) = self.guard.storage().get(&self.guard.config().trial_key)? else {
            return Ok(None);
        };
        // An unreadable marker counts as used.
        Ok(Some(serde_json::from_str(&raw).unwrap_or(TrialMarker {
            used: true,
            timestamp: 0,
        })))
    }
}

/// End of a billing period starting at `start`.
fn period_end(start: DateTime<Utc>, period: BillingPeriod) -> Result<DateTime<Utc>, GuardError> {
    match period {
        BillingPeriod::Monthly => start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| GuardError::InvalidSubscription("period end out of range".to_string())),
        BillingPeriod::Yearly => Ok(start + Duration::days(YEARLY_PERIOD_DAYS)),
    }
}
