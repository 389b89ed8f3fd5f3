//! Signed envelope and stored record format.
//!
//! The envelope wraps a subscription payload for storage:
//! - `payload` with injected `_timestamp` / `_version`
//! - `signature` (keyed digest over the canonical payload)
//! - `meta.createdAt` and `meta.checksum`
//! - `device` fingerprint and random `nonce` (informational)
//!
//! Every field is optional on the wire so that a damaged record can still be
//! parsed and reported precisely by the verifier.

use crate::crypto::digest::verification_digest;
use crate::crypto::signing::canonical_json;
use crate::GuardError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix of the companion key holding the storage-level digest.
pub const VERIFICATION_KEY_SUFFIX: &str = "_v";

/// Envelope metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMeta {
    /// Creation instant in epoch milliseconds (mirrors `_timestamp`).
    pub created_at: i64,

    /// First 16 hex characters of the signature.
    pub checksum: String,
}

/// Signed wrapper around a subscription payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// Payload object including `_timestamp` and `_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,

    /// Keyed digest over the canonical payload (64 hex chars).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Creation time and fast-path checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EnvelopeMeta>,

    /// Device fingerprint at write time. Never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Random per-write token. Never verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl SignedEnvelope {
    /// Convert to a JSON value.
    pub fn to_value(&self) -> Result<Value, GuardError> {
        serde_json::to_value(self)
            .map_err(|e| GuardError::Serialization(format!("Failed to serialize envelope: {}", e)))
    }

    /// Rebuild an envelope from an already-parsed JSON value.
    ///
    /// Returns `None` when the value does not have the envelope shape
    /// (e.g. `payload` is not an object).
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

/// What actually persists: the serialized envelope and its companion digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Canonical JSON of the envelope, stored under the primary key.
    pub envelope_json: String,

    /// Truncated digest of `envelope_json`, stored under `key + "_v"`.
    pub verification: String,
}

impl StoredRecord {
    /// Serialize an envelope and compute its independent verification digest.
    pub fn seal(envelope: &SignedEnvelope) -> Result<Self, GuardError> {
        let envelope_json = canonical_json(&envelope.to_value()?)?;
        let verification = verification_digest(&envelope_json);
        Ok(Self {
            envelope_json,
            verification,
        })
    }
}

/// Companion key for a primary storage key.
pub fn verification_key(key: &str) -> String {
    format!("{}{}", key, VERIFICATION_KEY_SUFFIX)
}
