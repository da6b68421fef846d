//! # Default Policy Constants
//!
//! Production defaults for every tunable in [`crate::config`].
//!
//! **CRITICAL:** These are DEFAULTS, not policy. Deployments override them
//! through the TOML config; code must always read the config structs, never
//! these constants directly.

/// Size of the live leaderboard window.
pub const DEFAULT_TOP_N: usize = 100;

/// Sliding-window length for rate limiting.
pub const DEFAULT_RATE_WINDOW_MS: u64 = 60_000;

/// Actions admitted per user per window.
pub const DEFAULT_USER_RATE_CAP: u32 = 30;

/// Actions admitted per origin per window (many users can share one origin).
pub const DEFAULT_ORIGIN_RATE_CAP: u32 = 240;

/// Base cooldown enforced after a rate violation.
pub const DEFAULT_COOLDOWN_BASE_MS: u64 = 1_000;

/// Cap on the progressively doubled cooldown.
pub const DEFAULT_COOLDOWN_CAP_MS: u64 = 60_000;

/// Rate violations inside one cooldown period before the limiter reports a
/// risk signal.
pub const DEFAULT_VIOLATION_RISK_THRESHOLD: u32 = 3;

/// Maximum tolerated client clock skew.
pub const DEFAULT_CLOCK_SKEW_MS: u64 = 30_000;

/// Nonce retention. Must be at least the clock-skew tolerance.
pub const DEFAULT_NONCE_TTL_MS: u64 = 120_000;

/// Flush interval for the batched broadcast class.
pub const DEFAULT_BATCH_FLUSH_MS: u64 = 5_000;

/// Hard cap on events delivered to one subscriber per second.
pub const DEFAULT_SUBSCRIBER_EVENTS_PER_SEC: u32 = 10;

/// Bounded capacity of each subscriber channel.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 256;

/// Risk score decay factor per elapsed decay period.
pub const DEFAULT_DECAY_FACTOR: f32 = 0.5;

/// Length of one risk decay period.
pub const DEFAULT_DECAY_PERIOD_MS: u64 = 30_000;

/// Risk at or above this attaches a review marker (T1).
pub const DEFAULT_REVIEW_THRESHOLD: f32 = 4.0;

/// Risk at or above this rejects the action (T2).
pub const DEFAULT_REJECT_THRESHOLD: f32 = 8.0;

/// Upper bound on the risk accumulator.
pub const DEFAULT_MAX_RISK: f32 = 100.0;

/// Strikes before suspension (S).
pub const DEFAULT_STRIKE_LIMIT: u32 = 3;

/// Length of a suspension.
pub const DEFAULT_BAN_DURATION_MS: u64 = 900_000;

/// Trailing window for velocity evaluation.
pub const DEFAULT_VELOCITY_WINDOW_MS: u64 = 10_000;

/// Capacity of the per-user recent-event ring buffer.
pub const DEFAULT_RECENT_EVENTS: usize = 64;

/// Largest difficulty tier a request may declare.
pub const MAX_DIFFICULTY_TIER: u8 = 10;

/// Largest streak a request may declare.
pub const MAX_STREAK: u32 = 10_000;
