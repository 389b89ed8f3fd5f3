//! SHA-256 digests used for signatures, checksums and key naming.

use sha2::{Digest, Sha256};

/// Number of signature hex characters mirrored in `meta.checksum`.
pub const CHECKSUM_LEN: usize = 16;

/// Number of hex characters persisted for the storage-level verification digest.
pub const VERIFICATION_DIGEST_LEN: usize = 32;

/// Compute SHA-256 of `data` and return lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Keyed digest: SHA-256 over `message` followed by `secret`.
///
/// The secret is client-visible; this evidences tampering, it does not
/// authenticate anything against a motivated attacker.
pub fn keyed_digest(message: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fast-path checksum derived from a signature.
pub fn checksum_of(signature: &str) -> &str {
    signature.get(..CHECKSUM_LEN).unwrap_or(signature)
}

/// Truncated digest stored under the `_v` companion key.
pub fn verification_digest(serialized_envelope: &str) -> String {
    let mut full = sha256_hex(serialized_envelope.as_bytes());
    full.truncate(VERIFICATION_DIGEST_LEN);
    full
}

/// Base-36 sum of the hostname's character codes.
///
/// Obfuscates the storage key per host; not a security boundary.
pub fn host_hash(hostname: &str) -> String {
    let sum: u64 = hostname.chars().map(|c| c as u64).sum();
    to_base36(sum)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
