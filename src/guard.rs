//! Subscription guard - the integrity module's public surface.
//!
//! A `SubscriptionGuard` is the explicit context holding the state that
//! lives for one session (one "page lifetime"): the tamper counter and the
//! rate-limit ledger. Dropping the guard and creating a new one is the
//! equivalent of a reload; only the lockout flag survives in storage.
//!
//! Read path:
//! 1. Lockout check (before touching the record)
//! 2. Parse stored envelope
//! 3. Compare the `_v` companion digest
//! 4. Verify the envelope signature, checksum, timestamp and period
//! 5. Compare device fingerprint (logged only)

use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::crypto::digest::verification_digest;
use crate::crypto::signing::{canonical_json, derive_secret, sign};
use crate::crypto::verify::verify_envelope;
use crate::device::random_nonce;
use crate::policy::lockout::TamperTracker;
use crate::policy::rate_limit::{RateDecision, RateLimiter};
use crate::protocol::external;
use crate::storage::envelope::{verification_key, SignedEnvelope, StoredRecord};
use crate::storage::Storage;
use crate::{GuardError, VerifyFailure};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

/// Signs, stores, verifies and rate-limits the local subscription record.
pub struct SubscriptionGuard {
    config: GuardConfig,
    secret: String,
    fingerprint: String,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    tamper: Mutex<TamperTracker>,
    limiter: Mutex<RateLimiter>,
}

impl SubscriptionGuard {
    /// Create a guard over `storage` using the system clock.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: GuardConfig, storage: Arc<dyn Storage>) -> Result<Self, GuardError> {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    /// Create a guard with an injected clock.
    pub fn with_clock(
        config: GuardConfig,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GuardError> {
        config.validate()?;

        let secret = derive_secret(&config.app_secret, &config.hostname);
        let fingerprint = config.device.fingerprint();
        let tamper = TamperTracker::new(
            config.tamper_threshold,
            config.lockout_duration,
            &config.block_key,
        );
        let limiter = RateLimiter::new(config.rate_limits.clone());

        Ok(Self {
            config,
            secret,
            fingerprint,
            storage,
            clock,
            tamper: Mutex::new(tamper),
            limiter: Mutex::new(limiter),
        })
    }

    /// Primary storage key for this host.
    pub fn storage_key(&self) -> String {
        self.config.storage_key()
    }

    /// Fingerprint of the configured device profile.
    pub fn device_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Sign `payload` and persist it with its companion digest.
    ///
    /// The two writes are not atomic as a pair; a torn write is reported as
    /// `IntegrityFailed` on the next read.
    pub fn secure_store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        payload: &T,
    ) -> Result<(), GuardError> {
        let mut envelope = sign(payload, &self.secret, self.clock.as_ref())?;
        envelope.device = Some(self.fingerprint.clone());
        envelope.nonce = Some(random_nonce());

        let record = StoredRecord::seal(&envelope)?;
        self.storage.set(key, &record.envelope_json)?;
        self.storage.set(&verification_key(key), &record.verification)?;

        debug!(key, "subscription record stored");
        Ok(())
    }

    /// Read and verify the record under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored. Parse, digest and
    /// verification failures each count as a tamper attempt.
    pub fn secure_retrieve(&self, key: &str) -> Result<Option<Map<String, Value>>, GuardError> {
        if self.tracker().is_blocked(self.storage.as_ref(), self.clock.as_ref())? {
            return Err(GuardError::AccessBlocked);
        }

        let Some(raw) = self.storage.get(key)? else {
            debug!(key, "no subscription record stored");
            return Ok(None);
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                let cleared = self.record_tamper_for(key)?;
                return Err(GuardError::InvalidFormat {
                    detail: e.to_string(),
                    cleared,
                });
            }
        };

        let stored_digest = self.storage.get(&verification_key(key))?;
        let actual_digest = verification_digest(&canonical_json(&value)?);
        if stored_digest.as_deref().map(str::trim) != Some(actual_digest.as_str()) {
            let cleared = self.record_tamper_for(key)?;
            return Err(GuardError::IntegrityFailed { cleared });
        }

        let verified = SignedEnvelope::from_value(value)
            .ok_or(VerifyFailure::StructureInvalid)
            .and_then(|envelope| {
                verify_envelope(&envelope, &self.secret, self.clock.as_ref())
                    .map(|payload| (envelope, payload))
            });

        let (envelope, payload) = match verified {
            Ok(verified) => verified,
            Err(reason) => {
                let cleared = self.record_tamper_for(key)?;
                return Err(GuardError::VerificationFailed { reason, cleared });
            }
        };

        if envelope.device.as_deref() != Some(self.fingerprint.as_str()) {
            warn!(
                key,
                stored = envelope.device.as_deref().unwrap_or("<none>"),
                "device fingerprint changed since the record was written"
            );
        }

        Ok(Some(payload))
    }

    /// Read, verify and deserialize the record under `key`.
    ///
    /// A verified payload that does not fit `T` is a caller error and is
    /// reported as `InvalidSubscription`, not as tampering.
    pub fn secure_retrieve_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, GuardError> {
        let Some(payload) = self.secure_retrieve(key)? else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(payload))
            .map(Some)
            .map_err(|e| GuardError::InvalidSubscription(format!("Unexpected record shape: {}", e)))
    }

    /// Whether the lockout is active.
    ///
    /// Storage failures are reported as blocked.
    pub fn is_security_blocked(&self) -> bool {
        match self
            .tracker()
            .is_blocked(self.storage.as_ref(), self.clock.as_ref())
        {
            Ok(blocked) => blocked,
            Err(e) => {
                error!(error = %e, "could not read lockout flag, treating as blocked");
                true
            }
        }
    }

    /// Record a tamper attempt against this host's storage key.
    ///
    /// Returns `true` when the attempt triggered the lockout.
    pub fn record_tamper_attempt(&self) -> Result<bool, GuardError> {
        self.record_tamper_for(&self.storage_key())
    }

    /// Check and record an invocation of a rate-limited action.
    pub fn check_rate_limit(&self, action: &str) -> RateDecision {
        self.limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check(action, self.clock.as_ref())
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit), as an error.
    pub fn enforce_rate_limit(&self, action: &str) -> Result<(), GuardError> {
        let decision = self.check_rate_limit(action);
        if decision.allowed {
            return Ok(());
        }
        Err(GuardError::RateLimitExceeded {
            action: action.to_string(),
            retry_after_secs: decision.retry_after.map(|d| d.num_seconds()).unwrap_or(0),
        })
    }

    /// Structural and timestamp plausibility of provider references.
    pub fn validate_with_external_provider(
        &self,
        subscription_ref: &str,
        customer_ref: &str,
    ) -> Result<(), GuardError> {
        external::validate_with_external_provider(
            subscription_ref,
            customer_ref,
            self.clock.as_ref(),
        )
    }

    /// Remove a record and its companion digest (e.g. on logout).
    pub fn clear(&self, key: &str) -> Result<(), GuardError> {
        self.storage.remove(key)?;
        self.storage.remove(&verification_key(key))?;
        debug!(key, "subscription record cleared");
        Ok(())
    }

    /// Tamper attempts recorded in this session.
    pub fn tamper_attempts(&self) -> u32 {
        self.tracker().attempts()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Underlying storage.
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Clock used for every time-dependent check.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn tracker(&self) -> std::sync::MutexGuard<'_, TamperTracker> {
        self.tamper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_tamper_for(&self, key: &str) -> Result<bool, GuardError> {
        self.tracker()
            .record_attempt(self.storage.as_ref(), key, self.clock.as_ref())
    }
}
