//! # Anti-Cheat Evaluation
//!
//! Per-user risk state machine over accepted-action history.
//!
//! ## Detection Methods
//!
//! - **Velocity**: trailing-window score per second above the kind ceiling
//! - **Sequence**: action kind outside the previous kind's successor set
//! - **Timing**: action faster than the kind's minimum plausible duration
//! - **Clamp signal**: the calculator had to clamp the computed delta
//! - **Rate signal**: repeated admission violations from the limiter
//!
//! Each flag adds a configured weight to the user's risk score; the score
//! decays exponentially while the user behaves. Decision ladder:
//! `< T1` accept, `[T1, T2)` accept with a review marker, `>= T2` reject
//! and strike. Enough strikes suspend the account until the ban elapses,
//! after which strikes reset.

use summit_core::config::{RiskConfig, ScoringConfig};
use summit_core::{ActionKind, TimestampMs};

/// Internal audit codes. Logged server-side, NEVER sent to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReasonCode {
    /// Windowed score velocity above the kind ceiling.
    VelocityExceeded,
    /// Kind not in the previous kind's successor set.
    SequenceViolation,
    /// Faster than the minimum plausible duration.
    TimingImplausible,
    /// Calculator clamped the computed delta.
    DeltaClamped,
    /// Rate limiter reported repeated violations.
    RateViolations,
    /// Strike limit reached; suspension begins.
    StrikeBan,
}

/// Final decision for one candidate action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Commit the action.
    Accept,
    /// Commit the action, marked for operator review.
    Review,
    /// Reject the action and record a strike.
    Reject,
}

/// Outcome of one evaluation, with its audit trail.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Accept / review / reject.
    pub verdict: Verdict,
    /// Risk score after this evaluation.
    pub risk: f32,
    /// Flags raised during this evaluation.
    pub reasons: Vec<ReasonCode>,
    /// Set when this evaluation triggered a suspension.
    pub banned_until: Option<TimestampMs>,
}

/// One accepted event in the recent-history ring.
#[derive(Clone, Copy, Debug, Default)]
struct RecentEvent {
    timestamp_ms: TimestampMs,
    delta: i64,
    kind: Option<ActionKind>,
}

/// Fixed-capacity ring of recent accepted events, newest overwrites oldest.
#[derive(Clone, Debug)]
struct EventRing {
    events: Vec<RecentEvent>,
    head: usize,
    len: usize,
}

impl EventRing {
    fn new(capacity: usize) -> Self {
        Self {
            events: vec![RecentEvent::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, event: RecentEvent) {
        self.events[self.head] = event;
        self.head = (self.head + 1) % self.events.len();
        self.len = (self.len + 1).min(self.events.len());
    }

    /// Sum of same-kind deltas with timestamps at or after `cutoff`.
    fn delta_sum_since(&self, cutoff: TimestampMs, kind: ActionKind) -> i64 {
        let mut sum = 0;
        for i in 0..self.len {
            let idx = (self.head + self.events.len() - 1 - i) % self.events.len();
            let event = &self.events[idx];
            if event.timestamp_ms < cutoff {
                break; // Ring is time-ordered newest-first from head.
            }
            if event.kind == Some(kind) {
                sum += event.delta;
            }
        }
        sum
    }
}

/// Per-user risk state. Owned exclusively by the evaluator; the pipeline
/// holds it under the user's shard lock.
#[derive(Clone, Debug)]
pub struct RiskProfile {
    risk: f32,
    strikes: u32,
    ban_until: Option<TimestampMs>,
    last_decay_ms: TimestampMs,
    recent: EventRing,
    last_kind: Option<ActionKind>,
    last_accepted_ms: Option<TimestampMs>,
}

impl RiskProfile {
    /// Creates a clean profile.
    #[must_use]
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            risk: 0.0,
            strikes: 0,
            ban_until: None,
            last_decay_ms: 0,
            recent: EventRing::new(recent_capacity),
            last_kind: None,
            last_accepted_ms: None,
        }
    }

    /// Returns the active ban expiry, clearing expired bans.
    ///
    /// Ban expiry resets the strike count: the user starts clean.
    pub fn active_ban(&mut self, now_ms: TimestampMs) -> Option<TimestampMs> {
        match self.ban_until {
            Some(until) if now_ms < until => Some(until),
            Some(_) => {
                self.ban_until = None;
                self.strikes = 0;
                self.risk = 0.0;
                None
            }
            None => None,
        }
    }

    /// Current risk score.
    #[must_use]
    pub fn risk(&self) -> f32 {
        self.risk
    }

    /// Current strike count.
    #[must_use]
    pub fn strikes(&self) -> u32 {
        self.strikes
    }
}

/// Risk state machine over candidate actions.
pub struct AntiCheatEvaluator {
    scoring: ScoringConfig,
    risk: RiskConfig,
}

impl AntiCheatEvaluator {
    /// Creates an evaluator with the given policy tables.
    #[must_use]
    pub fn new(scoring: ScoringConfig, risk: RiskConfig) -> Self {
        Self { scoring, risk }
    }

    /// Creates a profile sized for this evaluator's history window.
    #[must_use]
    pub fn new_profile(&self) -> RiskProfile {
        RiskProfile::new(self.risk.recent_events)
    }

    /// Reports repeated admission violations from the rate limiter.
    ///
    /// Applied outside [`AntiCheatEvaluator::evaluate`] because the signal
    /// rides requests that never reach evaluation.
    pub fn apply_rate_signal(&self, profile: &mut RiskProfile, now_ms: TimestampMs) {
        self.decay(profile, now_ms);
        profile.risk = (profile.risk + self.risk.rate_weight).min(self.risk.max_risk);
        tracing::debug!(
            risk = profile.risk,
            reason = ?ReasonCode::RateViolations,
            "rate violations raised risk"
        );
    }

    /// Evaluates one candidate action AFTER the calculator produced its
    /// delta. Mutates risk/strike/ban state; accepted-event history is
    /// recorded separately via [`AntiCheatEvaluator::record_accepted`] once
    /// the commit is durable.
    pub fn evaluate(
        &self,
        profile: &mut RiskProfile,
        kind: ActionKind,
        delta: i64,
        clamped: bool,
        now_ms: TimestampMs,
    ) -> Evaluation {
        self.decay(profile, now_ms);

        let policy = self.scoring.policy(kind);
        let mut reasons = Vec::new();

        // Velocity: same-kind deltas against the kind's own ceiling. The
        // candidate delta is included so a single absurd action is caught
        // immediately, not one action late.
        let cutoff = now_ms.saturating_sub(self.risk.velocity_window_ms);
        let windowed = profile.recent.delta_sum_since(cutoff, kind) + delta;
        let per_sec = windowed as f64 / (self.risk.velocity_window_ms as f64 / 1_000.0);
        if per_sec > policy.velocity_ceiling_per_sec {
            profile.risk += self.risk.velocity_weight;
            reasons.push(ReasonCode::VelocityExceeded);
        }

        if let Some(previous) = profile.last_kind {
            if !self.scoring.policy(previous).successors.contains(&kind) {
                profile.risk += self.risk.sequence_weight;
                reasons.push(ReasonCode::SequenceViolation);
            }
        }

        if let Some(last_ms) = profile.last_accepted_ms {
            if now_ms.saturating_sub(last_ms) < policy.min_interval_ms {
                profile.risk += self.risk.timing_weight;
                reasons.push(ReasonCode::TimingImplausible);
            }
        }

        if clamped {
            profile.risk += self.risk.clamp_weight;
            reasons.push(ReasonCode::DeltaClamped);
        }

        profile.risk = profile.risk.min(self.risk.max_risk);

        let mut banned_until = None;
        let verdict = if profile.risk >= self.risk.reject_threshold {
            profile.strikes += 1;
            if profile.strikes >= self.risk.strike_limit {
                let until = now_ms + self.risk.ban_duration_ms;
                profile.ban_until = Some(until);
                banned_until = Some(until);
                reasons.push(ReasonCode::StrikeBan);
            }
            Verdict::Reject
        } else if profile.risk >= self.risk.review_threshold {
            Verdict::Review
        } else {
            Verdict::Accept
        };

        if verdict != Verdict::Accept {
            tracing::debug!(
                ?verdict,
                risk = profile.risk,
                strikes = profile.strikes,
                ?reasons,
                "anti-cheat decision"
            );
        }

        Evaluation { verdict, risk: profile.risk, reasons, banned_until }
    }

    /// Records a committed action into the user's accepted history.
    pub fn record_accepted(
        &self,
        profile: &mut RiskProfile,
        kind: ActionKind,
        delta: i64,
        now_ms: TimestampMs,
    ) {
        profile.recent.push(RecentEvent {
            timestamp_ms: now_ms,
            delta,
            kind: Some(kind),
        });
        profile.last_kind = Some(kind);
        profile.last_accepted_ms = Some(now_ms);
    }

    /// Applies exponential decay for the periods elapsed since the last
    /// evaluation. Risk only ever decreases here.
    fn decay(&self, profile: &mut RiskProfile, now_ms: TimestampMs) {
        if profile.last_decay_ms == 0 {
            profile.last_decay_ms = now_ms;
            return;
        }
        let period = self.risk.decay_period_ms.max(1);
        let elapsed = now_ms.saturating_sub(profile.last_decay_ms);
        let periods = elapsed / period;
        if periods == 0 {
            return;
        }
        // Capped exponent: beyond 32 periods the factor underflows anyway.
        profile.risk *= self.risk.decay_factor.powi(periods.min(32) as i32);
        if profile.risk < 1e-4 {
            profile.risk = 0.0;
        }
        profile.last_decay_ms += periods * period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> AntiCheatEvaluator {
        AntiCheatEvaluator::new(ScoringConfig::default(), RiskConfig::default())
    }

    #[test]
    fn test_clean_action_accepted_with_zero_risk() {
        let eval = evaluator();
        let mut profile = eval.new_profile();
        let result = eval.evaluate(&mut profile, ActionKind::Takedown, 50, false, 60_000);
        assert_eq!(result.verdict, Verdict::Accept);
        assert_eq!(result.risk, 0.0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_velocity_flag_raises_risk() {
        let eval = evaluator();
        let mut profile = eval.new_profile();

        // Pack the window with committed score far above 25/sec.
        for i in 0..10 {
            eval.record_accepted(&mut profile, ActionKind::Takedown, 300, 60_000 + i * 100);
        }
        let result = eval.evaluate(&mut profile, ActionKind::Takedown, 300, false, 61_100);
        assert!(result.reasons.contains(&ReasonCode::VelocityExceeded));
        assert!(result.risk >= RiskConfig::default().velocity_weight);
    }

    #[test]
    fn test_sequence_violation_flagged() {
        let eval = evaluator();
        let mut profile = eval.new_profile();

        // round_win's successor set has no bounty_claim.
        eval.record_accepted(&mut profile, ActionKind::RoundWin, 400, 60_000);
        let result = eval.evaluate(
            &mut profile,
            ActionKind::BountyClaim,
            200,
            false,
            100_000,
        );
        assert!(result.reasons.contains(&ReasonCode::SequenceViolation));
    }

    #[test]
    fn test_timing_violation_flagged() {
        let eval = evaluator();
        let mut profile = eval.new_profile();

        eval.record_accepted(&mut profile, ActionKind::Takedown, 50, 60_000);
        // Takedown needs 800ms; this arrives 100ms later.
        let result = eval.evaluate(&mut profile, ActionKind::Takedown, 50, false, 60_100);
        assert!(result.reasons.contains(&ReasonCode::TimingImplausible));
    }

    #[test]
    fn test_risk_decays_between_evaluations() {
        let eval = evaluator();
        let mut profile = eval.new_profile();

        // Raise some risk with a clamp flag.
        let flagged = eval.evaluate(&mut profile, ActionKind::Takedown, 50, true, 60_000);
        assert!(flagged.risk > 0.0);

        // Two full decay periods later, a clean action sees reduced risk.
        let later = eval.evaluate(
            &mut profile,
            ActionKind::Takedown,
            50,
            false,
            60_000 + 2 * RiskConfig::default().decay_period_ms,
        );
        let expected = flagged.risk * RiskConfig::default().decay_factor.powi(2);
        assert!((later.risk - expected).abs() < 1e-3);
    }

    #[test]
    fn test_reject_at_threshold_and_strike() {
        let mut risk_config = RiskConfig::default();
        risk_config.reject_threshold = 2.0;
        risk_config.review_threshold = 1.0;
        risk_config.clamp_weight = 2.5;
        let eval = AntiCheatEvaluator::new(ScoringConfig::default(), risk_config);
        let mut profile = eval.new_profile();

        let result = eval.evaluate(&mut profile, ActionKind::Takedown, 50, true, 60_000);
        assert_eq!(result.verdict, Verdict::Reject);
        assert_eq!(profile.strikes(), 1);
    }

    #[test]
    fn test_review_band_accepts_with_marker() {
        let mut risk_config = RiskConfig::default();
        risk_config.review_threshold = 0.5;
        risk_config.reject_threshold = 50.0;
        let eval = AntiCheatEvaluator::new(ScoringConfig::default(), risk_config);
        let mut profile = eval.new_profile();

        let result = eval.evaluate(&mut profile, ActionKind::Takedown, 50, true, 60_000);
        assert_eq!(result.verdict, Verdict::Review);
    }

    #[test]
    fn test_rate_signal_raises_risk_without_evaluation() {
        let eval = evaluator();
        let mut profile = eval.new_profile();

        eval.apply_rate_signal(&mut profile, 60_000);
        assert!((profile.risk() - RiskConfig::default().rate_weight).abs() < 1e-6);

        // The raised risk feeds the next real evaluation.
        let result = eval.evaluate(&mut profile, ActionKind::Takedown, 50, false, 60_001);
        assert!(result.risk >= RiskConfig::default().rate_weight);
    }

    #[test]
    fn test_strikes_accumulate_to_ban_and_reset_on_expiry() {
        let mut risk_config = RiskConfig::default();
        risk_config.reject_threshold = 1.0;
        risk_config.review_threshold = 0.5;
        risk_config.clamp_weight = 2.0;
        risk_config.strike_limit = 3;
        risk_config.ban_duration_ms = 10_000;
        risk_config.decay_factor = 1.0; // Hold risk steady for the test.
        let eval = AntiCheatEvaluator::new(ScoringConfig::default(), risk_config);
        let mut profile = eval.new_profile();

        let mut banned = None;
        for i in 0..3 {
            let result =
                eval.evaluate(&mut profile, ActionKind::Takedown, 50, true, 60_000 + i);
            assert_eq!(result.verdict, Verdict::Reject);
            banned = result.banned_until;
        }
        let until = banned.expect("third strike must suspend");
        assert_eq!(profile.active_ban(60_005), Some(until));

        // After expiry the ban clears and strikes reset.
        assert_eq!(profile.active_ban(until + 1), None);
        assert_eq!(profile.strikes(), 0);
    }
}
