//! Subguard error types.

use thiserror::Error;

/// Reasons the envelope verifier rejects a signed envelope.
///
/// Every check is independently necessary; the first failing check is the
/// one reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    /// Envelope, payload or signature is missing or malformed.
    #[error("invalid envelope structure")]
    StructureInvalid,

    /// Recomputed keyed digest differs from the stored signature.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Fast-path checksum differs from the signature prefix.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Payload timestamp is beyond the clock-skew tolerance.
    #[error("timestamp in the future")]
    TimestampInFuture,

    /// Subscription period exceeds the maximum allowed span.
    #[error("subscription period too long")]
    PeriodTooLong,
}

/// Errors surfaced by the subscription guard and manager.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Underlying key-value storage failed.
    #[error("Storage I/O error: {0}")]
    StorageIO(String),

    /// A value could not be serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Lockout is active; no stored data is read.
    #[error("Access blocked after repeated tampering")]
    AccessBlocked,

    /// Stored value is not parseable.
    #[error("Stored subscription has an invalid format: {detail}{}", cleared_note(.cleared))]
    InvalidFormat {
        /// Parser diagnostic.
        detail: String,
        /// Whether this failure triggered the lockout and wiped storage.
        cleared: bool,
    },

    /// Storage-level verification digest is missing or does not match.
    #[error("Subscription integrity check failed{}", cleared_note(.cleared))]
    IntegrityFailed {
        /// Whether this failure triggered the lockout and wiped storage.
        cleared: bool,
    },

    /// Envelope verifier rejected the stored record.
    #[error("Subscription verification failed: {reason}{}", cleared_note(.cleared))]
    VerificationFailed {
        /// The verifier's specific reason.
        reason: VerifyFailure,
        /// Whether this failure triggered the lockout and wiped storage.
        cleared: bool,
    },

    /// Action invoked too often within its window.
    #[error("Rate limit exceeded for '{action}', retry in {retry_after_secs}s")]
    RateLimitExceeded {
        /// Action name.
        action: String,
        /// Seconds until the oldest recorded invocation leaves the window.
        retry_after_secs: i64,
    },

    /// External provider references are implausible.
    #[error("External reference rejected: {0}")]
    ExternalRefInvalid(String),

    /// Subscription record violates its invariants or the requested transition.
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// The one-time trial was already consumed.
    #[error("Trial already used")]
    TrialAlreadyUsed,

    /// The effective plan does not include a required feature.
    #[error("Required entitlement missing: {code}")]
    EntitlementMissing {
        /// The feature code that was required but missing.
        code: String,
    },
}

impl GuardError {
    /// Whether this error stems from detected tampering.
    pub fn is_tamper(&self) -> bool {
        matches!(
            self,
            GuardError::InvalidFormat { .. }
                | GuardError::IntegrityFailed { .. }
                | GuardError::VerificationFailed { .. }
        )
    }

    /// Whether the tamper attempt behind this error wiped the stored record.
    pub fn storage_cleared(&self) -> bool {
        match self {
            GuardError::InvalidFormat { cleared, .. }
            | GuardError::IntegrityFailed { cleared }
            | GuardError::VerificationFailed { cleared, .. } => *cleared,
            _ => false,
        }
    }
}

fn cleared_note(cleared: &bool) -> &'static str {
    if *cleared {
        " (stored subscription cleared, access blocked)"
    } else {
        ""
    }
}
