//! Envelope verification.
//!
//! All checks must pass; the first failure is reported:
//! 1. Structure (payload object and signature present)
//! 2. Signature (recomputed keyed digest)
//! 3. Checksum (`meta.checksum` equals the signature prefix)
//! 4. Timestamp (not beyond clock-skew tolerance)
//! 5. Period (`expiresAt` within 365 days of `meta.createdAt`)

use crate::clock::Clock;
use crate::crypto::digest::checksum_of;
use crate::crypto::freshness::{check_not_future, check_period, parse_rfc3339};
use crate::crypto::signing::{payload_signature, TIMESTAMP_FIELD};
use crate::storage::envelope::SignedEnvelope;
use crate::VerifyFailure;
use serde_json::{Map, Value};

/// Payload field bounding the subscription's validity.
const EXPIRES_AT_FIELD: &str = "expiresAt";

/// Verify a signed envelope and return its payload as-is.
///
/// The returned payload still carries `_timestamp` and `_version`.
pub fn verify_envelope(
    envelope: &SignedEnvelope,
    secret: &str,
    clock: &dyn Clock,
) -> Result<Map<String, Value>, VerifyFailure> {
    // 1. Structure
    let payload = envelope
        .payload
        .as_ref()
        .ok_or(VerifyFailure::StructureInvalid)?;
    let signature = envelope
        .signature
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(VerifyFailure::StructureInvalid)?;

    // 2. Signature
    let expected =
        payload_signature(payload, secret).map_err(|_| VerifyFailure::StructureInvalid)?;
    if expected != signature {
        return Err(VerifyFailure::SignatureMismatch);
    }

    // 3. Checksum
    let meta = envelope.meta.as_ref().ok_or(VerifyFailure::ChecksumMismatch)?;
    if meta.checksum != checksum_of(signature) {
        return Err(VerifyFailure::ChecksumMismatch);
    }

    // 4. Timestamp; an absent `_timestamp` has nothing to bound
    if let Some(timestamp) = payload.get(TIMESTAMP_FIELD).and_then(Value::as_i64) {
        check_not_future(timestamp, clock)?;
    }

    // 5. Period
    match payload.get(EXPIRES_AT_FIELD) {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) => {
            let expires_at = parse_rfc3339(raw).ok_or(VerifyFailure::StructureInvalid)?;
            check_period(meta.created_at, expires_at)?;
        }
        Some(_) => return Err(VerifyFailure::StructureInvalid),
    }

    Ok(payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::crypto::signing::{sign, VERSION_FIELD};
    use serde_json::json;

    const SECRET: &str = "test-secret::localhost";

    fn clock() -> MockClock {
        MockClock::from_rfc3339("2024-01-01T00:00:00Z")
    }

    fn monthly_payload() -> Value {
        json!({
            "planId": "pro",
            "status": "active",
            "startDate": "2024-01-01T00:00:00Z",
            "expiresAt": "2024-02-01T00:00:00Z",
            "billingPeriod": "monthly"
        })
    }

    #[test]
    fn test_round_trip_returns_payload_with_metadata() {
        let clock = clock();
        let original = monthly_payload();
        let envelope = sign(&original, SECRET, &clock).unwrap();

        let data = verify_envelope(&envelope, SECRET, &clock).unwrap();

        let mut expected = original.as_object().cloned().unwrap();
        expected.insert(TIMESTAMP_FIELD.to_string(), json!(clock.now_millis()));
        expected.insert(VERSION_FIELD.to_string(), json!(2));
        assert_eq!(data, expected);
    }

    #[test]
    fn test_missing_payload() {
        let clock = clock();
        let mut envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        envelope.payload = None;
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::StructureInvalid)
        );
    }

    #[test]
    fn test_missing_signature() {
        let clock = clock();
        let mut envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        envelope.signature = Some(String::new());
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::StructureInvalid)
        );
    }

    #[test]
    fn test_tampered_plan_is_signature_mismatch() {
        let clock = clock();
        let mut envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        if let Some(payload) = envelope.payload.as_mut() {
            payload.insert("planId".to_string(), json!("premium"));
        }
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_is_signature_mismatch() {
        let clock = clock();
        let envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        assert_eq!(
            verify_envelope(&envelope, "guess::localhost", &clock),
            Err(VerifyFailure::SignatureMismatch)
        );
    }

    #[test]
    fn test_checksum_mismatch() {
        let clock = clock();
        let mut envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        if let Some(meta) = envelope.meta.as_mut() {
            meta.checksum = "0000000000000000".to_string();
        }
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::ChecksumMismatch)
        );
    }

    #[test]
    fn test_missing_meta_is_checksum_mismatch() {
        let clock = clock();
        let mut envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        envelope.meta = None;
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::ChecksumMismatch)
        );
    }

    #[test]
    fn test_extreme_created_at_is_structure_invalid() {
        let clock = clock();
        let mut envelope = sign(&monthly_payload(), SECRET, &clock).unwrap();
        if let Some(meta) = envelope.meta.as_mut() {
            meta.created_at = i64::MIN;
        }
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::StructureInvalid)
        );
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let signing_clock = MockClock::from_rfc3339("2024-01-01T00:05:00Z");
        let envelope = sign(&monthly_payload(), SECRET, &signing_clock).unwrap();

        // Verifier's clock is five minutes behind the signer's.
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock()),
            Err(VerifyFailure::TimestampInFuture)
        );
    }

    #[test]
    fn test_small_clock_skew_tolerated() {
        let signing_clock = MockClock::from_rfc3339("2024-01-01T00:00:45Z");
        let envelope = sign(&monthly_payload(), SECRET, &signing_clock).unwrap();
        assert!(verify_envelope(&envelope, SECRET, &clock()).is_ok());
    }

    #[test]
    fn test_period_longer_than_a_year_rejected() {
        let clock = clock();
        let payload = json!({
            "planId": "pro",
            "status": "active",
            "expiresAt": "2025-01-02T00:00:00Z"
        });
        let envelope = sign(&payload, SECRET, &clock).unwrap();
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::PeriodTooLong)
        );
    }

    #[test]
    fn test_unparseable_expiry_rejected() {
        let clock = clock();
        let envelope = sign(&json!({"expiresAt": "someday"}), SECRET, &clock).unwrap();
        assert_eq!(
            verify_envelope(&envelope, SECRET, &clock),
            Err(VerifyFailure::StructureInvalid)
        );
    }

    #[test]
    fn test_no_expiry_passes() {
        let clock = clock();
        let envelope = sign(&json!({"status": "none"}), SECRET, &clock).unwrap();
        assert!(verify_envelope(&envelope, SECRET, &clock).is_ok());
    }
}
