//! Keyed digests, envelope signing and verification.

pub mod digest;
pub mod freshness;
pub mod signing;
pub mod verify;
