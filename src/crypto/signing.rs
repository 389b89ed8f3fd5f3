//! Envelope signing.
//!
//! The signature is a keyed digest over the canonical JSON of the payload
//! after `_timestamp` and `_version` have been injected:
//! ```text
//! signature = sha256_hex(canonical(payload + {_timestamp, _version}) + secret)
//! ```

use crate::clock::Clock;
use crate::crypto::digest::{checksum_of, keyed_digest};
use crate::storage::envelope::{EnvelopeMeta, SignedEnvelope};
use crate::GuardError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Payload field carrying the signing instant (epoch ms).
pub const TIMESTAMP_FIELD: &str = "_timestamp";

/// Payload field carrying the envelope format version.
pub const VERSION_FIELD: &str = "_version";

/// Current envelope format version.
pub const PAYLOAD_VERSION: u32 = 2;

/// Combine the per-deployment secret with the hostname.
///
/// Both halves ship to the client, so the result is readable by anyone
/// who can inspect the bundle.
pub fn derive_secret(app_secret: &str, hostname: &str) -> String {
    format!("{}::{}", app_secret, hostname)
}

/// Serialize a JSON value deterministically.
///
/// `serde_json` maps are ordered by key, so parsing and re-serializing a
/// value reproduces the same bytes.
pub fn canonical_json(value: &Value) -> Result<String, GuardError> {
    serde_json::to_string(value)
        .map_err(|e| GuardError::Serialization(format!("Failed to serialize: {}", e)))
}

/// Signature over a payload object.
pub fn payload_signature(payload: &Map<String, Value>, secret: &str) -> Result<String, GuardError> {
    // Map -> Value clone keeps a single canonicalization path.
    let canonical = canonical_json(&Value::Object(payload.clone()))?;
    Ok(keyed_digest(&canonical, secret))
}

/// Sign a payload, producing an envelope without device or nonce.
///
/// The payload must serialize to a JSON object.
pub fn sign<T: Serialize + ?Sized>(
    payload: &T,
    secret: &str,
    clock: &dyn Clock,
) -> Result<SignedEnvelope, GuardError> {
    let value = serde_json::to_value(payload)
        .map_err(|e| GuardError::Serialization(format!("Failed to serialize payload: {}", e)))?;

    let Value::Object(mut fields) = value else {
        return Err(GuardError::Serialization(
            "Subscription payload must be a JSON object".to_string(),
        ));
    };

    let timestamp = clock.now_millis();
    fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(timestamp));
    fields.insert(VERSION_FIELD.to_string(), Value::from(PAYLOAD_VERSION));

    let signature = payload_signature(&fields, secret)?;
    let checksum = checksum_of(&signature).to_string();

    Ok(SignedEnvelope {
        payload: Some(fields),
        meta: Some(EnvelopeMeta {
            created_at: timestamp,
            checksum,
        }),
        signature: Some(signature),
        device: None,
        nonce: None,
    })
}
