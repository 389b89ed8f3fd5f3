//! Subscription record and its signed view.

use crate::GuardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum span between `startDate` and `expiresAt`.
pub const MAX_SUBSCRIPTION_DAYS: i64 = 365;

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// No subscription.
    #[default]
    None,
    /// Paid and current.
    Active,
    /// Free trial.
    Trial,
    /// Cancelled; access continues until `expiresAt`.
    Cancelled,
    /// Past `expiresAt`.
    Expired,
}

impl SubscriptionStatus {
    /// Statuses that must carry an expiry date.
    pub fn requires_expiry(self) -> bool {
        matches!(self, Self::Active | Self::Trial | Self::Cancelled)
    }
}

/// Billing cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    /// Billed every calendar month.
    Monthly,
    /// Billed every 365 days.
    Yearly,
}

/// The entitlement record being protected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayload {
    /// Plan identifier from the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    /// Start of validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,

    /// End of validity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Lifecycle status.
    #[serde(default)]
    pub status: SubscriptionStatus,

    /// Provider subscription reference (`sub_<epoch-ms>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_subscription_ref: Option<String>,

    /// Provider customer reference (`cus_<epoch-ms>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_customer_ref: Option<String>,

    /// Billing cadence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<BillingPeriod>,
}

impl SubscriptionPayload {
    /// Check the record's own invariants.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.status.requires_expiry() && self.expires_at.is_none() {
            return Err(GuardError::InvalidSubscription(format!(
                "status {:?} requires expiresAt",
                self.status
            )));
        }

        if self.expires_at.is_some() && self.start_date.is_none() {
            return Err(GuardError::InvalidSubscription(
                "expiresAt requires startDate".to_string(),
            ));
        }

        if let (Some(start), Some(expires)) = (self.start_date, self.expires_at) {
            if expires < start {
                return Err(GuardError::InvalidSubscription(
                    "expiresAt precedes startDate".to_string(),
                ));
            }
            if expires - start > chrono::Duration::days(MAX_SUBSCRIPTION_DAYS) {
                return Err(GuardError::InvalidSubscription(format!(
                    "subscription period exceeds {} days",
                    MAX_SUBSCRIPTION_DAYS
                )));
            }
        }

        Ok(())
    }

    /// Status as of `now`: access-granting records past expiry read as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.expires_at {
            Some(expires) if self.status.requires_expiry() && expires <= now => {
                SubscriptionStatus::Expired
            }
            _ => self.status,
        }
    }

    /// Whether the record currently grants plan features.
    pub fn grants_access(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now).requires_expiry()
    }
}

/// A verified payload including the signer's injected fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSubscription {
    /// The subscription record.
    #[serde(flatten)]
    pub subscription: SubscriptionPayload,

    /// Signing instant, epoch milliseconds.
    #[serde(rename = "_timestamp")]
    pub timestamp: i64,

    /// Envelope format version.
    #[serde(rename = "_version")]
    pub version: u32,
}
