//! # Score Calculator
//!
//! **The only place a score delta is ever computed.**
//!
//! Pure and deterministic: `(kind, params) -> delta` from the config tables.
//! No client-supplied score is ever trusted; the client only declares
//! multiplier inputs, and even those are bounded here.
//!
//! Out-of-range results clamp rather than error. Clamping is still reported
//! upward: it feeds the anti-cheat evaluator as a risk signal, because an
//! honest client rarely rides the table limits.

use crate::config::ScoringConfig;
use crate::types::{ActionKind, ActionParams};

/// Result of a delta computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// Computed, clamped score delta.
    pub delta: i64,
    /// True when any bound (multiplier or absolute) was hit.
    pub clamped: bool,
}

/// Computes the score delta for a validated action.
///
/// `base * difficulty_multiplier * streak_multiplier`, each multiplier
/// bounded to the configured range, the product clamped to the kind's
/// absolute `[min_delta, max_delta]`.
#[must_use]
pub fn compute_delta(config: &ScoringConfig, kind: ActionKind, params: ActionParams) -> ScoreOutcome {
    let policy = config.policy(kind);

    let raw_difficulty = 1.0 + f64::from(params.difficulty_tier) * config.difficulty_step;
    let difficulty = raw_difficulty.clamp(config.multiplier_min, config.multiplier_max);

    let raw_streak = 1.0 + f64::from(params.streak) * config.streak_step;
    let streak = raw_streak.clamp(config.multiplier_min, config.multiplier_max);

    let raw = (policy.base as f64 * difficulty * streak).round();
    // f64 keeps 53 bits of integer precision; table values are far below that.
    let unclamped = raw as i64;
    let delta = unclamped.clamp(policy.min_delta, policy.max_delta);

    let clamped = delta != unclamped
        || raw_difficulty != difficulty
        || raw_streak != streak;

    ScoreOutcome { delta, clamped }
}
