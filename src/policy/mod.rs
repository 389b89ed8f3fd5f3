//! Lockout, rate limiting and plan access policies.

pub mod access;
pub mod lockout;
pub mod rate_limit;
