//! Device fingerprinting and nonces.
//!
//! The fingerprint is recorded in every envelope as a diagnostic signal.
//! It is compared on read and a mismatch is logged, never rejected:
//! agent updates, locale or display changes alter it legitimately.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;

/// Hex characters kept from the fingerprint digest.
const FINGERPRINT_LEN: usize = 32;

/// Environment characteristics the fingerprint is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Client agent string.
    pub user_agent: String,
    /// Preferred locale (e.g. `pt-BR`).
    pub language: String,
    /// Screen geometry, `<width>x<height>x<depth>`.
    pub screen: String,
    /// Local offset from UTC in minutes.
    pub timezone_offset_minutes: i32,
    /// Hash of a rendering probe.
    pub render_hash: String,
}

impl DeviceProfile {
    /// Collects the native equivalents of the environment characteristics.
    #[must_use]
    pub fn collect() -> Self {
        let language = env::var("LC_ALL")
            .or_else(|_| env::var("LANG"))
            .map(|l| l.split('.').next().unwrap_or_default().replace('_', "-"))
            .unwrap_or_else(|_| "unknown".to_string());

        let offset = chrono::Local::now().offset().local_minus_utc() / 60;

        Self {
            user_agent: format!(
                "{}/{} ({}; {})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                env::consts::OS,
                env::consts::ARCH
            ),
            language,
            screen: "unknown".to_string(),
            timezone_offset_minutes: offset,
            render_hash: render_probe_hash(),
        }
    }

    /// Fingerprint string: truncated SHA-256 over the joined components.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let combined = [
            self.user_agent.as_str(),
            self.language.as_str(),
            self.screen.as_str(),
            &self.timezone_offset_minutes.to_string(),
            self.render_hash.as_str(),
        ]
        .join("|");

        let mut id = hex::encode(Sha256::digest(combined.as_bytes()));
        id.truncate(FINGERPRINT_LEN);
        id
    }
}

/// Stand-in for a canvas probe: the machine hostname, hashed.
fn render_probe_hash() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let mut hash = hex::encode(Sha256::digest(host.as_bytes()));
    hash.truncate(16);
    hash
}

/// Random per-write token.
pub fn random_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
