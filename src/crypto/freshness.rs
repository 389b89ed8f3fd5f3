//! Timestamp and period-range enforcement for signed payloads.

use crate::clock::Clock;
use crate::VerifyFailure;
use chrono::{DateTime, Utc};

/// Maximum future tolerance for payload timestamps (60 seconds).
pub const MAX_FUTURE_TOLERANCE_MS: i64 = 60 * 1000;

/// Maximum span between envelope creation and `expiresAt` (365 days).
pub const MAX_PERIOD_DAYS: i64 = 365;

/// Parse an RFC 3339 timestamp as stored in payloads.
pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reject timestamps more than the skew tolerance ahead of now.
///
/// A timestamp too far from now to subtract is `StructureInvalid`.
pub fn check_not_future(timestamp_ms: i64, clock: &dyn Clock) -> Result<(), VerifyFailure> {
    let ahead_ms = timestamp_ms
        .checked_sub(clock.now_millis())
        .ok_or(VerifyFailure::StructureInvalid)?;
    if ahead_ms > MAX_FUTURE_TOLERANCE_MS {
        return Err(VerifyFailure::TimestampInFuture);
    }
    Ok(())
}

/// Reject expiry dates further than 365 days past creation.
///
/// A creation time too far from `expires_at` to subtract is `StructureInvalid`.
pub fn check_period(created_at_ms: i64, expires_at: DateTime<Utc>) -> Result<(), VerifyFailure> {
    let span_ms = expires_at
        .timestamp_millis()
        .checked_sub(created_at_ms)
        .ok_or(VerifyFailure::StructureInvalid)?;
    if span_ms > max_period_ms() {
        return Err(VerifyFailure::PeriodTooLong);
    }
    Ok(())
}

/// The period bound in milliseconds.
pub fn max_period_ms() -> i64 {
    chrono::Duration::days(MAX_PERIOD_DAYS).num_milliseconds()
}
