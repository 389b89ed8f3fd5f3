//! Sliding-window rate limiting of entitlement-changing actions.
//!
//! The ledger is in-memory only: a speed bump, not a durable guarantee.
//! Actions without a rule pass through.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Subscribe action name.
pub const ACTION_SUBSCRIBE: &str = "subscribe";

/// Trial action name.
pub const ACTION_TRIAL: &str = "trial";

/// Cancel action name.
pub const ACTION_CANCEL: &str = "cancel";

/// Limit for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRule {
    /// Action name.
    pub action: String,
    /// Maximum invocations inside the window.
    pub max_calls: usize,
    /// Window length.
    pub window: Duration,
}

impl RateRule {
    /// Build a rule.
    pub fn new(action: &str, max_calls: usize, window: Duration) -> Self {
        Self {
            action: action.to_string(),
            max_calls,
            window,
        }
    }
}

/// Default rules: subscribe 3/hour, trial 1/30 days, cancel 2/day.
pub fn default_rules() -> Vec<RateRule> {
    vec![
        RateRule::new(ACTION_SUBSCRIBE, 3, Duration::hours(1)),
        RateRule::new(ACTION_TRIAL, 1, Duration::days(30)),
        RateRule::new(ACTION_CANCEL, 2, Duration::days(1)),
    ]
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Human-readable reason when rejected.
    pub reason: Option<String>,
    /// Time until the next invocation would be allowed.
    pub retry_after: Option<Duration>,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after: None,
        }
    }
}

/// Per-action sliding-window limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    rules: HashMap<String, RateRule>,
    ledger: HashMap<String, Vec<DateTime<Utc>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RateLimiter {
    /// Create a limiter from a rule set.
    pub fn new(rules: Vec<RateRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.action.clone(), r)).collect(),
            ledger: HashMap::new(),
        }
    }

    /// Rule configured for an action.
    pub fn rule(&self, action: &str) -> Option<&RateRule> {
        self.rules.get(action)
    }

    /// Check and, if allowed, record an invocation of `action`.
    ///
    /// Rejected checks are not recorded.
    pub fn check(&mut self, action: &str, clock: &dyn Clock) -> RateDecision {
        let Some(rule) = self.rules.get(action) else {
            debug!(action, "no rate rule, allowing");
            return RateDecision::allow();
        };

        let now = clock.now_utc();
        let calls = self.ledger.entry(action.to_string()).or_default();
        calls.retain(|t| now - *t < rule.window);

        if calls.len() >= rule.max_calls {
            let retry_after = calls
                .iter()
                .min()
                .map(|oldest| *oldest + rule.window - now)
                .unwrap_or(rule.window);
            warn!(action, limit = rule.max_calls, "rate limit exceeded");
            return RateDecision {
                allowed: false,
                reason: Some(format!(
                    "'{}' is limited to {} call(s) per {} minutes",
                    action,
                    rule.max_calls,
                    rule.window.num_minutes()
                )),
                retry_after: Some(retry_after),
            };
        }

        calls.push(now);
        RateDecision::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn clock() -> MockClock {
        MockClock::from_rfc3339("2024-01-01T00:00:00Z")
    }

    #[test]
    fn test_trial_once_per_window() {
        let clock = clock();
        let mut limiter = RateLimiter::default();

        assert!(limiter.check(ACTION_TRIAL, &clock).allowed);

        clock.advance(Duration::days(29));
        let denied = limiter.check(ACTION_TRIAL, &clock);
        assert!(!denied.allowed);
        assert!(denied.reason.is_some());
        assert_eq!(denied.retry_after, Some(Duration::days(1)));

        clock.advance(Duration::days(1) + Duration::seconds(1));
        assert!(limiter.check(ACTION_TRIAL, &clock).allowed);
    }

    #[test]
    fn test_subscribe_three_per_rolling_hour() {
        let clock = clock();
        let mut limiter = RateLimiter::default();

        for _ in 0..3 {
            assert!(limiter.check(ACTION_SUBSCRIBE, &clock).allowed);
            clock.advance(Duration::minutes(10));
        }
        assert!(!limiter.check(ACTION_SUBSCRIBE, &clock).allowed);

        // First call (t=0) leaves the window at t=60m.
        clock.advance(Duration::minutes(30));
        assert!(limiter.check(ACTION_SUBSCRIBE, &clock).allowed);
        assert!(!limiter.check(ACTION_SUBSCRIBE, &clock).allowed);
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let clock = clock();
        let mut limiter = RateLimiter::default();

        assert!(limiter.check(ACTION_CANCEL, &clock).allowed);
        assert!(limiter.check(ACTION_CANCEL, &clock).allowed);
        for _ in 0..5 {
            assert!(!limiter.check(ACTION_CANCEL, &clock).allowed);
        }

        clock.advance(Duration::days(1));
        assert!(limiter.check(ACTION_CANCEL, &clock).allowed);
        assert!(limiter.check(ACTION_CANCEL, &clock).allowed);
    }

    #[test]
    fn test_unknown_action_passes_open() {
        let clock = clock();
        let mut limiter = RateLimiter::default();
        for _ in 0..100 {
            assert!(limiter.check("refund", &clock).allowed);
        }
    }

    #[test]
    fn test_actions_are_independent() {
        let clock = clock();
        let mut limiter = RateLimiter::default();
        assert!(limiter.check(ACTION_TRIAL, &clock).allowed);
        assert!(limiter.check(ACTION_SUBSCRIBE, &clock).allowed);
        assert!(!limiter.check(ACTION_TRIAL, &clock).allowed);
    }

    #[test]
    fn test_default_rules() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.rule(ACTION_SUBSCRIBE).unwrap().max_calls, 3);
        assert_eq!(limiter.rule(ACTION_TRIAL).unwrap().window, Duration::days(30));
        assert_eq!(limiter.rule(ACTION_CANCEL).unwrap().max_calls, 2);
        assert!(limiter.rule("refund").is_none());
    }
}
