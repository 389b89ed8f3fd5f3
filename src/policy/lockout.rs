//! Tamper counting and time-boxed lockout.
//!
//! ```text
//! Unblocked --(threshold tamper attempts)--> Blocked --(lockout elapsed)--> Unblocked
//! ```
//!
//! The attempt counter lives only as long as the tracker instance. The
//! lockout flag is the one piece of state that persists.

use crate::clock::Clock;
use crate::storage::envelope::verification_key;
use crate::storage::Storage;
use crate::GuardError;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Tamper attempts that trigger a lockout.
pub const DEFAULT_TAMPER_THRESHOLD: u32 = 3;

/// Lockout length (24 hours).
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Well-known key holding the lockout start (epoch ms).
pub const DEFAULT_BLOCK_KEY: &str = "_security_block";

/// Counts verification failures and manages the lockout flag.
#[derive(Debug, Clone)]
pub struct TamperTracker {
    attempts: u32,
    threshold: u32,
    lockout_ms: i64,
    block_key: String,
}

impl Default for TamperTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TAMPER_THRESHOLD, DEFAULT_LOCKOUT, DEFAULT_BLOCK_KEY)
    }
}

impl TamperTracker {
    /// Create a tracker with explicit threshold, lockout length and flag key.
    pub fn new(threshold: u32, lockout: Duration, block_key: &str) -> Self {
        Self {
            attempts: 0,
            threshold,
            lockout_ms: i64::try_from(lockout.as_millis()).unwrap_or(i64::MAX),
            block_key: block_key.to_string(),
        }
    }

    /// Attempts recorded by this instance.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a tamper attempt against `record_key`.
    ///
    /// At the threshold, removes the record and its `_v` companion, writes
    /// the lockout flag and returns `true`.
    pub fn record_attempt(
        &mut self,
        storage: &dyn Storage,
        record_key: &str,
        clock: &dyn Clock,
    ) -> Result<bool, GuardError> {
        self.attempts = self.attempts.saturating_add(1);
        warn!(
            attempts = self.attempts,
            threshold = self.threshold,
            "subscription tamper attempt recorded"
        );

        if self.attempts < self.threshold {
            return Ok(false);
        }

        storage.remove(record_key)?;
        storage.remove(&verification_key(record_key))?;
        storage.set(&self.block_key, &clock.now_millis().to_string())?;

        error!(
            attempts = self.attempts,
            "tamper threshold reached, subscription cleared and access blocked"
        );
        Ok(true)
    }

    /// Whether the lockout flag is present and still within its window.
    ///
    /// An expired, unreadable or out-of-range flag is removed.
    pub fn is_blocked(&self, storage: &dyn Storage, clock: &dyn Clock) -> Result<bool, GuardError> {
        let Some(raw) = storage.get(&self.block_key)? else {
            return Ok(false);
        };

        let elapsed_ms = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|blocked_at| clock.now_millis().checked_sub(blocked_at));
        if elapsed_ms.is_some_and(|elapsed| elapsed < self.lockout_ms) {
            return Ok(true);
        }

        debug!("lockout expired, clearing flag");
        storage.remove(&self.block_key)?;
        Ok(false)
    }
}
