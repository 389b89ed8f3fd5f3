//! Subguard configuration.

use crate::crypto::digest::host_hash;
use crate::device::DeviceProfile;
use crate::policy::lockout::{DEFAULT_BLOCK_KEY, DEFAULT_LOCKOUT, DEFAULT_TAMPER_THRESHOLD};
use crate::policy::rate_limit::{default_rules, RateRule};
use crate::GuardError;
use std::time::Duration;

/// Prefix of the primary subscription storage key.
pub const DEFAULT_KEY_PREFIX: &str = "_emagreci_sub_data_";

/// Key of the one-time trial marker.
pub const DEFAULT_TRIAL_KEY: &str = "_emagreci_trial_v2";

/// Configuration for the subscription guard.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Per-deployment signing string.
    /// SECURITY: ships with the client; it evidences tampering, it does not
    /// keep a motivated attacker out. Entitlement authority stays server-side.
    pub app_secret: String,

    /// Hostname mixed into the secret and the storage key.
    pub hostname: String,

    /// Primary storage key prefix; the host hash is appended.
    pub key_prefix: String,

    /// Key holding the lockout start.
    pub block_key: String,

    /// Key holding the one-time trial marker.
    pub trial_key: String,

    /// Tamper attempts before lockout.
    pub tamper_threshold: u32,

    /// How long a lockout lasts.
    pub lockout_duration: Duration,

    /// Rate limits for entitlement-changing actions.
    pub rate_limits: Vec<RateRule>,

    /// Environment characteristics for the device fingerprint.
    pub device: DeviceProfile,
}

impl GuardConfig {
    /// Configuration with defaults for the given secret and hostname.
    pub fn new(app_secret: &str, hostname: &str) -> Self {
        Self {
            app_secret: app_secret.to_string(),
            hostname: hostname.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            block_key: DEFAULT_BLOCK_KEY.to_string(),
            trial_key: DEFAULT_TRIAL_KEY.to_string(),
            tamper_threshold: DEFAULT_TAMPER_THRESHOLD,
            lockout_duration: DEFAULT_LOCKOUT,
            rate_limits: default_rules(),
            device: DeviceProfile::collect(),
        }
    }

    /// Configuration for the current machine's hostname.
    pub fn for_local_host(app_secret: &str) -> Result<Self, GuardError> {
        let hostname = hostname::get()
            .map_err(|e| GuardError::ConfigError(format!("Could not read hostname: {}", e)))?
            .into_string()
            .map_err(|_| GuardError::ConfigError("Hostname is not valid UTF-8".to_string()))?;
        Ok(Self::new(app_secret, &hostname))
    }

    /// Primary storage key: prefix plus base-36 host hash.
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.key_prefix, host_hash(&self.hostname))
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.app_secret.is_empty() {
            return Err(GuardError::ConfigError(
                "app_secret cannot be empty".to_string(),
            ));
        }
        if self.hostname.is_empty() {
            return Err(GuardError::ConfigError(
                "hostname cannot be empty".to_string(),
            ));
        }
        if self.key_prefix.is_empty() || self.block_key.is_empty() || self.trial_key.is_empty() {
            return Err(GuardError::ConfigError(
                "storage keys cannot be empty".to_string(),
            ));
        }
        if self.tamper_threshold == 0 {
            return Err(GuardError::ConfigError(
                "tamper_threshold must be at least 1".to_string(),
            ));
        }
        if let Some(rule) = self.rate_limits.iter().find(|r| r.window <= chrono::Duration::zero()) {
            return Err(GuardError::ConfigError(format!(
                "rate window for '{}' must be positive",
                rule.action
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = GuardConfig::new("secret", "localhost");
        assert!(config.validate().is_ok());
        assert_eq!(config.tamper_threshold, 3);
        assert_eq!(config.lockout_duration, Duration::from_secs(86_400));
        assert_eq!(config.rate_limits.len(), 3);
    }

    #[test]
    fn test_storage_key_uses_host_hash() {
        let config = GuardConfig::new("secret", "localhost");
        assert_eq!(config.storage_key(), "_emagreci_sub_data_qx");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = GuardConfig::new("", "localhost");
        assert!(matches!(config.validate(), Err(GuardError::ConfigError(_))));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = GuardConfig::new("secret", "localhost");
        config.tamper_threshold = 0;
        assert!(matches!(config.validate(), Err(GuardError::ConfigError(_))));
    }

    #[test]
    fn test_non_positive_window_rejected() {
        let mut config = GuardConfig::new("secret", "localhost");
        config.rate_limits.push(RateRule::new("refund", 1, chrono::Duration::zero()));
        assert!(matches!(config.validate(), Err(GuardError::ConfigError(_))));
    }
}
