//! Local plausibility checks for payment-provider references.
//!
//! The provider issues references shaped `<prefix>_<epoch-ms>`. Only the
//! shape and the embedded timestamp are checked here; the provider is never
//! contacted. Real verification belongs to a trusted server.

use crate::clock::Clock;
use crate::GuardError;

/// Prefix of provider subscription references.
pub const SUBSCRIPTION_REF_PREFIX: &str = "sub_";

/// Prefix of provider customer references.
pub const CUSTOMER_REF_PREFIX: &str = "cus_";

/// Oldest acceptable reference age (365 days).
pub const MAX_REF_AGE_DAYS: i64 = 365;

/// Check both provider references for structural and timestamp plausibility.
pub fn validate_with_external_provider(
    subscription_ref: &str,
    customer_ref: &str,
    clock: &dyn Clock,
) -> Result<(), GuardError> {
    check_reference(subscription_ref, SUBSCRIPTION_REF_PREFIX, clock)?;
    check_reference(customer_ref, CUSTOMER_REF_PREFIX, clock)?;
    Ok(())
}

/// Parse a single reference and return its embedded timestamp (epoch ms).
pub fn check_reference(reference: &str, prefix: &str, clock: &dyn Clock) -> Result<i64, GuardError> {
    let digits = reference.strip_prefix(prefix).ok_or_else(|| {
        GuardError::ExternalRefInvalid(format!("{:?} does not start with {:?}", reference, prefix))
    })?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GuardError::ExternalRefInvalid(format!(
            "{:?} has a non-numeric timestamp",
            reference
        )));
    }

    let issued_ms: i64 = digits
        .parse()
        .map_err(|_| GuardError::ExternalRefInvalid(format!("{:?} timestamp overflows", reference)))?;

    let now_ms = clock.now_millis();
    if issued_ms > now_ms {
        return Err(GuardError::ExternalRefInvalid(format!(
            "{:?} is issued in the future",
            reference
        )));
    }

    let max_age_ms = chrono::Duration::days(MAX_REF_AGE_DAYS).num_milliseconds();
    if now_ms - issued_ms > max_age_ms {
        return Err(GuardError::ExternalRefInvalid(format!(
            "{:?} is older than {} days",
            reference, MAX_REF_AGE_DAYS
        )));
    }

    Ok(issued_ms)
}
