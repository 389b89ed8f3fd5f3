//! Subscription data model and provider reference checks.

pub mod external;
pub mod models;
