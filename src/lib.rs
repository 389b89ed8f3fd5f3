//! # Subguard
//!
//! **Tamper-evident local storage for subscription entitlements.**
//!
//! Subguard signs the subscription record a client keeps in local storage,
//! verifies it on every read, and answers repeated tampering with a
//! temporary lockout. Entitlement-changing actions are rate limited and
//! payment provider references are plausibility checked before they are
//! written.
//!
//! ## Features
//!
//! - **Keyed SHA-256 signature** over a canonical JSON form of the record
//! - **Companion digest** stored beside the record for fast corruption checks
//! - **Freshness and period checks** against clock skew and forged expiries
//! - **Tamper lockout** after repeated failures, with storage cleared
//! - **Sliding-window rate limits** for subscribe, trial and cancel
//! - **Device fingerprint** recorded with each signed write
//!
//! ## Quickstart
//!
//! ```no_run
//! use subguard::{
//!     BillingPeriod, FileStorage, GuardConfig, ProviderReceipt, SubscriptionGuard,
//!     SubscriptionManager,
//! };
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), subguard::GuardError> {
//!     let config = GuardConfig::for_local_host("per-deployment-secret")?;
//!     let storage = Arc::new(FileStorage::new("myapp")?);
//!     let manager = SubscriptionManager::new(SubscriptionGuard::new(config, storage)?);
//!
//!     let receipt = ProviderReceipt {
//!         subscription_ref: "sub_1717200000000".to_string(),
//!         customer_ref: "cus_1717200000000".to_string(),
//!     };
//!     manager.subscribe("pro", BillingPeriod::Monthly, &receipt)?;
//!
//!     if manager.has_feature("export") {
//!         println!("export unlocked");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Subguard detects:
//! - **Casual edits** of the stored record (signature and digest mismatch)
//! - **Forged expiries** beyond one year or timestamps from the future
//! - **Copying storage** to another host (hostname is part of the secret)
//!
//! Subguard does **not** stop a determined attacker. The signing secret
//! ships with the client, so anyone reading the binary can re-sign a
//! record. Treat the server as the entitlement authority and this crate
//! as an early tripwire.
//!
//! ## Configuration
//!
//! - `app_secret` - per-deployment signing string
//! - `hostname` - mixed into the secret and the storage key
//! - `tamper_threshold` / `lockout_duration` - lockout policy
//! - `rate_limits` - per-action sliding windows
//!
//! See [`GuardConfig`] for full documentation.

#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/subguard/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Environment
pub mod device;

// Record formats and provider references
pub mod protocol;

// Storage backends and envelope format
pub mod storage;

// Policy layer
pub mod policy;

// Integrity guard
pub mod guard;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::GuardConfig;
pub use device::DeviceProfile;
pub use errors::{GuardError, VerifyFailure};
pub use guard::SubscriptionGuard;
pub use manager::{ProviderReceipt, SubscriptionManager};
pub use policy::access::{Plan, PlanCatalog};
pub use policy::rate_limit::{RateDecision, RateRule};
pub use protocol::models::{
    BillingPeriod, SignedSubscription, SubscriptionPayload, SubscriptionStatus,
};
pub use storage::file::FileStorage;
pub use storage::memory::MemoryStorage;
pub use storage::Storage;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
