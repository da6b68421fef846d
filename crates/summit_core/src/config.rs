//! # Pipeline Configuration
//!
//! Every threshold, weight, cap and table in the pipeline is DATA, loaded
//! once at startup from TOML. Tuning policy never requires a redeploy of
//! logic.
//!
//! This crate only parses strings; reading the file from disk happens at the
//! pipeline edge. A missing section falls back to the production defaults in
//! [`crate::constants`].

use crate::constants;
use crate::types::ActionKind;
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML syntax or type error.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// Structurally valid TOML describing an unusable policy.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Per-action-kind scoring and plausibility policy.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct KindPolicy {
    /// Base score value before multipliers.
    pub base: i64,
    /// Absolute floor for the computed delta.
    pub min_delta: i64,
    /// Absolute ceiling for the computed delta.
    pub max_delta: i64,
    /// Maximum sustainable score per second before the velocity check fires.
    pub velocity_ceiling_per_sec: f64,
    /// Minimum plausible duration since the previous accepted action.
    pub min_interval_ms: u64,
    /// Action kinds allowed to follow this one.
    pub successors: Vec<ActionKind>,
}

impl Default for KindPolicy {
    fn default() -> Self {
        Self {
            base: 10,
            min_delta: 0,
            max_delta: 1_000,
            velocity_ceiling_per_sec: 50.0,
            min_interval_ms: 500,
            successors: vec![
                ActionKind::Takedown,
                ActionKind::ObjectiveCapture,
                ActionKind::RoundWin,
                ActionKind::BountyClaim,
            ],
        }
    }
}

/// Score calculation tables (see `score::compute_delta`).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Multiplier added per declared difficulty tier.
    pub difficulty_step: f64,
    /// Multiplier added per declared streak step.
    pub streak_step: f64,
    /// Lower bound applied to each multiplier.
    pub multiplier_min: f64,
    /// Upper bound applied to each multiplier.
    pub multiplier_max: f64,
    /// Largest difficulty tier a request may declare before it is malformed.
    pub max_difficulty_tier: u8,
    /// Largest streak a request may declare before it is malformed.
    pub max_streak: u32,
    /// Policy for [`ActionKind::Takedown`].
    pub takedown: KindPolicy,
    /// Policy for [`ActionKind::ObjectiveCapture`].
    pub objective_capture: KindPolicy,
    /// Policy for [`ActionKind::RoundWin`].
    pub round_win: KindPolicy,
    /// Policy for [`ActionKind::BountyClaim`].
    pub bounty_claim: KindPolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            difficulty_step: 0.25,
            streak_step: 0.1,
            multiplier_min: 1.0,
            multiplier_max: 3.0,
            max_difficulty_tier: constants::MAX_DIFFICULTY_TIER,
            max_streak: constants::MAX_STREAK,
            takedown: KindPolicy {
                base: 50,
                min_delta: 0,
                max_delta: 300,
                velocity_ceiling_per_sec: 25.0,
                min_interval_ms: 800,
                successors: vec![
                    ActionKind::Takedown,
                    ActionKind::ObjectiveCapture,
                    ActionKind::BountyClaim,
                    ActionKind::RoundWin,
                ],
            },
            objective_capture: KindPolicy {
                base: 120,
                min_delta: 0,
                max_delta: 600,
                velocity_ceiling_per_sec: 20.0,
                min_interval_ms: 5_000,
                successors: vec![
                    ActionKind::Takedown,
                    ActionKind::RoundWin,
                    ActionKind::BountyClaim,
                ],
            },
            round_win: KindPolicy {
                base: 400,
                min_delta: 0,
                max_delta: 2_000,
                velocity_ceiling_per_sec: 15.0,
                min_interval_ms: 30_000,
                successors: vec![
                    ActionKind::Takedown,
                    ActionKind::ObjectiveCapture,
                ],
            },
            bounty_claim: KindPolicy {
                base: 200,
                min_delta: 0,
                max_delta: 1_000,
                velocity_ceiling_per_sec: 10.0,
                min_interval_ms: 2_000,
                successors: vec![
                    ActionKind::Takedown,
                    ActionKind::ObjectiveCapture,
                    ActionKind::RoundWin,
                ],
            },
        }
    }
}

impl ScoringConfig {
    /// Returns the policy table for an action kind.
    #[must_use]
    pub fn policy(&self, kind: ActionKind) -> &KindPolicy {
        match kind {
            ActionKind::Takedown => &self.takedown,
            ActionKind::ObjectiveCapture => &self.objective_capture,
            ActionKind::RoundWin => &self.round_win,
            ActionKind::BountyClaim => &self.bounty_claim,
        }
    }
}

/// Sliding-window admission policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Trailing window length.
    pub window_ms: u64,
    /// Admissions per user per window.
    pub user_cap: u32,
    /// Admissions per origin per window.
    pub origin_cap: u32,
    /// Base cooldown after a violation.
    pub cooldown_base_ms: u64,
    /// Cap on the progressively doubled cooldown.
    pub cooldown_cap_ms: u64,
    /// Violations within one cooldown before a risk signal is reported.
    pub violation_risk_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: constants::DEFAULT_RATE_WINDOW_MS,
            user_cap: constants::DEFAULT_USER_RATE_CAP,
            origin_cap: constants::DEFAULT_ORIGIN_RATE_CAP,
            cooldown_base_ms: constants::DEFAULT_COOLDOWN_BASE_MS,
            cooldown_cap_ms: constants::DEFAULT_COOLDOWN_CAP_MS,
            violation_risk_threshold: constants::DEFAULT_VIOLATION_RISK_THRESHOLD,
        }
    }
}

/// Anti-cheat weights, thresholds and windows.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Multiplier applied to the risk score per elapsed decay period.
    pub decay_factor: f32,
    /// Length of one decay period.
    pub decay_period_ms: u64,
    /// Weight added when windowed score velocity exceeds the kind ceiling.
    pub velocity_weight: f32,
    /// Weight added when the action kind violates the transition table.
    pub sequence_weight: f32,
    /// Weight added when the action arrives implausibly fast.
    pub timing_weight: f32,
    /// Weight added when the calculator clamped the delta.
    pub clamp_weight: f32,
    /// Weight added per rate-limiter risk signal.
    pub rate_weight: f32,
    /// Review marker threshold (T1).
    pub review_threshold: f32,
    /// Rejection threshold (T2).
    pub reject_threshold: f32,
    /// Upper bound on the accumulator.
    pub max_risk: f32,
    /// Strikes before suspension (S).
    pub strike_limit: u32,
    /// Suspension length.
    pub ban_duration_ms: u64,
    /// Trailing window for the velocity check.
    pub velocity_window_ms: u64,
    /// Capacity of the per-user recent-event ring buffer.
    pub recent_events: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            decay_factor: constants::DEFAULT_DECAY_FACTOR,
            decay_period_ms: constants::DEFAULT_DECAY_PERIOD_MS,
            velocity_weight: 3.0,
            sequence_weight: 2.0,
            timing_weight: 2.5,
            clamp_weight: 1.0,
            rate_weight: 1.5,
            review_threshold: constants::DEFAULT_REVIEW_THRESHOLD,
            reject_threshold: constants::DEFAULT_REJECT_THRESHOLD,
            max_risk: constants::DEFAULT_MAX_RISK,
            strike_limit: constants::DEFAULT_STRIKE_LIMIT,
            ban_duration_ms: constants::DEFAULT_BAN_DURATION_MS,
            velocity_window_ms: constants::DEFAULT_VELOCITY_WINDOW_MS,
            recent_events: constants::DEFAULT_RECENT_EVENTS,
        }
    }
}

/// Replay-protection policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReplayConfig {
    /// Nonce retention window. Clamped up to at least `clock_skew_ms`.
    pub nonce_ttl_ms: u64,
    /// Tolerated client clock skew.
    pub clock_skew_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            nonce_ttl_ms: constants::DEFAULT_NONCE_TTL_MS,
            clock_skew_ms: constants::DEFAULT_CLOCK_SKEW_MS,
        }
    }
}

/// Ranking window policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RankingConfig {
    /// Size of the live leaderboard window (N).
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_n: constants::DEFAULT_TOP_N }
    }
}

/// Broadcast delivery policy.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Flush interval for the batched class.
    pub batch_flush_interval_ms: u64,
    /// Hard per-subscriber delivery cap, events per second.
    pub events_per_sec: u32,
    /// Bounded capacity of each subscriber channel.
    pub queue_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            batch_flush_interval_ms: constants::DEFAULT_BATCH_FLUSH_MS,
            events_per_sec: constants::DEFAULT_SUBSCRIBER_EVENTS_PER_SEC,
            queue_capacity: constants::DEFAULT_SUBSCRIBER_QUEUE,
        }
    }
}

/// Root configuration for the whole pipeline.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummitConfig {
    /// Score tables.
    pub scoring: ScoringConfig,
    /// Admission control.
    pub rate_limit: RateLimitConfig,
    /// Anti-cheat policy.
    pub risk: RiskConfig,
    /// Replay protection.
    pub replay: ReplayConfig,
    /// Leaderboard window.
    pub ranking: RankingConfig,
    /// Delivery policy.
    pub broadcast: BroadcastConfig,
}

impl SummitConfig {
    /// Parses a TOML document and validates the resulting policy.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk.review_threshold >= self.risk.reject_threshold {
            return Err(ConfigError::Inconsistent(
                "review threshold must be below reject threshold".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.risk.decay_factor) {
            return Err(ConfigError::Inconsistent(
                "decay factor must be within [0, 1]".to_string(),
            ));
        }
        if self.scoring.multiplier_min > self.scoring.multiplier_max {
            return Err(ConfigError::Inconsistent(
                "multiplier bounds inverted".to_string(),
            ));
        }
        if self.rate_limit.window_ms == 0 || self.rate_limit.user_cap == 0 {
            return Err(ConfigError::Inconsistent(
                "rate window and user cap must be non-zero".to_string(),
            ));
        }
        if self.ranking.top_n == 0 {
            return Err(ConfigError::Inconsistent("top_n must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Effective nonce retention: never below the tolerated clock skew, so a
    /// replay inside the skew window is always caught.
    #[must_use]
    pub fn nonce_retention_ms(&self) -> u64 {
        self.replay.nonce_ttl_ms.max(self.replay.clock_skew_ms)
    }
}
