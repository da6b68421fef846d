//! # Sliding-Window Rate Limiter
//!
//! Admission control per user and per origin.
//!
//! Each key owns a bounded circular buffer of admission timestamps; a
//! request is admitted only while the count inside the trailing window is
//! below the cap. Violations escalate: every additional violation inside
//! the cooldown period doubles the enforced cooldown (capped), and repeated
//! violations surface as a risk signal for the anti-cheat evaluator.

use parking_lot::Mutex;
use std::collections::HashMap;
use summit_core::config::RateLimitConfig;
use summit_core::{TimestampMs, UserId};

/// Rejection detail for an over-budget request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateRejection {
    /// Milliseconds until admission will be considered again.
    pub retry_after_ms: u64,
    /// True when violations crossed the reporting threshold; the caller
    /// forwards this to the anti-cheat evaluator.
    pub risk_signal: bool,
}

/// Bounded circular buffer of admission timestamps.
///
/// Capacity equals the admission cap: more than `cap` admissions can never
/// sit inside one window, so the oldest slot is always safe to overwrite.
#[derive(Clone, Debug)]
struct TimestampRing {
    slots: Box<[TimestampMs]>,
    head: usize,
    len: usize,
}

impl TimestampRing {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, ts: TimestampMs) {
        self.slots[self.head] = ts;
        self.head = (self.head + 1) % self.slots.len();
        self.len = (self.len + 1).min(self.slots.len());
    }

    fn count_since(&self, cutoff: TimestampMs) -> usize {
        let mut count = 0;
        for i in 0..self.len {
            let idx = (self.head + self.slots.len() - 1 - i) % self.slots.len();
            if self.slots[idx] >= cutoff {
                count += 1;
            }
        }
        count
    }
}

/// Per-key limiter state.
#[derive(Clone, Debug)]
struct KeyState {
    ring: TimestampRing,
    violations: u32,
    cooldown_ms: u64,
    cooldown_until: TimestampMs,
    last_violation_ms: TimestampMs,
}

impl KeyState {
    fn new(capacity: usize, base_cooldown_ms: u64) -> Self {
        Self {
            ring: TimestampRing::new(capacity),
            violations: 0,
            cooldown_ms: base_cooldown_ms,
            cooldown_until: 0,
            last_violation_ms: 0,
        }
    }
}

/// Sliding-window admission control over user and origin keys.
pub struct RateLimiter {
    config: RateLimitConfig,
    users: Mutex<HashMap<u64, KeyState>>,
    origins: Mutex<HashMap<String, KeyState>>,
}

impl RateLimiter {
    /// Creates a limiter with the given policy.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            users: Mutex::new(HashMap::new()),
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to admit one action for `user_id` (and `origin`, when the
    /// transport knows one).
    ///
    /// Admission records the timestamp under every involved key; rejection
    /// records a violation and escalates the cooldown.
    pub fn admit(
        &self,
        user_id: UserId,
        origin: Option<&str>,
        now_ms: TimestampMs,
    ) -> Result<(), RateRejection> {
        // Check both keys before recording under either: a request rejected
        // by the origin cap must not consume user budget.
        {
            let mut users = self.users.lock();
            let state = users
                .entry(user_id.0)
                .or_insert_with(|| KeyState::new(self.config.user_cap as usize, self.config.cooldown_base_ms));
            if let Some(rejection) = Self::over_budget(&self.config, state, self.config.user_cap, now_ms) {
                return Err(rejection);
            }
        }
        if let Some(origin) = origin {
            let mut origins = self.origins.lock();
            let state = origins
                .entry(origin.to_string())
                .or_insert_with(|| KeyState::new(self.config.origin_cap as usize, self.config.cooldown_base_ms));
            if let Some(rejection) = Self::over_budget(&self.config, state, self.config.origin_cap, now_ms) {
                tracing::debug!(%user_id, origin, "origin over admission cap");
                return Err(rejection);
            }
        }

        if let Some(state) = self.users.lock().get_mut(&user_id.0) {
            state.ring.push(now_ms);
        }
        if let Some(origin) = origin {
            if let Some(state) = self.origins.lock().get_mut(origin) {
                state.ring.push(now_ms);
            }
        }
        Ok(())
    }

    /// Checks one key, recording a violation when over budget.
    fn over_budget(
        config: &RateLimitConfig,
        state: &mut KeyState,
        cap: u32,
        now_ms: TimestampMs,
    ) -> Option<RateRejection> {
        // Still inside an enforced cooldown from earlier violations.
        if now_ms < state.cooldown_until {
            return Some(Self::record_violation(config, state, now_ms));
        }

        let cutoff = now_ms.saturating_sub(config.window_ms);
        if state.ring.count_since(cutoff) >= cap as usize {
            return Some(Self::record_violation(config, state, now_ms));
        }

        // Clean admission after a quiet window resets the escalation.
        if state.violations > 0
            && now_ms.saturating_sub(state.last_violation_ms) > config.window_ms
        {
            state.violations = 0;
            state.cooldown_ms = config.cooldown_base_ms;
        }
        None
    }

    fn record_violation(
        config: &RateLimitConfig,
        state: &mut KeyState,
        now_ms: TimestampMs,
    ) -> RateRejection {
        // Progressive penalty: violations inside the cooldown period double
        // the next enforced cooldown, capped.
        if state.violations > 0
            && now_ms.saturating_sub(state.last_violation_ms) <= state.cooldown_ms
        {
            state.cooldown_ms = (state.cooldown_ms * 2).min(config.cooldown_cap_ms);
        }
        state.violations += 1;
        state.last_violation_ms = now_ms;
        state.cooldown_until = now_ms + state.cooldown_ms;

        RateRejection {
            retry_after_ms: state.cooldown_until - now_ms,
            risk_signal: state.violations >= config.violation_risk_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user_cap: u32) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: 60_000,
            user_cap,
            origin_cap: 100,
            cooldown_base_ms: 1_000,
            cooldown_cap_ms: 16_000,
            violation_risk_threshold: 3,
        }
    }

    #[test]
    fn test_sixth_action_in_window_rejected() {
        let limiter = RateLimiter::new(config(5));
        for i in 0..5 {
            assert!(limiter.admit(UserId(1), None, 1_000 + i * 100).is_ok());
        }
        let rejection = limiter.admit(UserId(1), None, 2_000).unwrap_err();
        assert!(rejection.retry_after_ms > 0);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(config(5));
        for i in 0..5 {
            assert!(limiter.admit(UserId(1), None, 1_000 + i).is_ok());
        }
        // Past the window (plus the violation cooldown) the budget refills.
        assert!(limiter.admit(UserId(1), None, 120_000).is_ok());
    }

    #[test]
    fn test_users_do_not_share_budget() {
        let limiter = RateLimiter::new(config(1));
        assert!(limiter.admit(UserId(1), None, 1_000).is_ok());
        assert!(limiter.admit(UserId(2), None, 1_000).is_ok());
        assert!(limiter.admit(UserId(1), None, 1_001).is_err());
    }

    #[test]
    fn test_origin_cap_rejects_before_consuming_user_budget() {
        let mut cfg = config(10);
        cfg.origin_cap = 1;
        let limiter = RateLimiter::new(cfg);

        assert!(limiter.admit(UserId(1), Some("10.0.0.1"), 1_000).is_ok());
        // Different user, same saturated origin.
        assert!(limiter.admit(UserId(2), Some("10.0.0.1"), 1_001).is_err());
        // The rejected user still has full personal budget elsewhere.
        assert!(limiter.admit(UserId(2), Some("10.0.0.2"), 1_002).is_ok());
    }

    #[test]
    fn test_progressive_cooldown_doubles_and_caps() {
        let limiter = RateLimiter::new(config(1));
        assert!(limiter.admit(UserId(1), None, 0).is_ok());

        let first = limiter.admit(UserId(1), None, 1).unwrap_err();
        assert_eq!(first.retry_after_ms, 1_000);

        // Violating again inside the cooldown doubles it.
        let second = limiter.admit(UserId(1), None, 2).unwrap_err();
        assert_eq!(second.retry_after_ms, 2_000);

        let third = limiter.admit(UserId(1), None, 3).unwrap_err();
        assert_eq!(third.retry_after_ms, 4_000);

        // Escalate to the cap, never beyond.
        let mut last = third;
        for t in 4..20 {
            last = limiter.admit(UserId(1), None, t).unwrap_err();
        }
        assert!(last.retry_after_ms <= 16_000);
    }

    #[test]
    fn test_risk_signal_after_threshold() {
        let limiter = RateLimiter::new(config(1));
        assert!(limiter.admit(UserId(1), None, 0).is_ok());

        let first = limiter.admit(UserId(1), None, 1).unwrap_err();
        assert!(!first.risk_signal);
        let second = limiter.admit(UserId(1), None, 2).unwrap_err();
        assert!(!second.risk_signal);
        let third = limiter.admit(UserId(1), None, 3).unwrap_err();
        assert!(third.risk_signal);
    }
}
