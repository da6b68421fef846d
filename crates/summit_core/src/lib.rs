//! # SUMMIT Core
//!
//! Common types used by every stage of the score pipeline.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - I/O of any kind (sockets, files)
//! - Clocks (`SystemTime` reads live at the pipeline edge)
//! - Any other workspace crate
//!
//! Timestamps flow through the pipeline as explicit `now_ms` arguments so
//! every component stays deterministic and unit-testable.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod error;
pub mod score;
pub mod types;

pub use config::{
    BroadcastConfig, ConfigError, KindPolicy, RankingConfig, RateLimitConfig, ReplayConfig,
    RiskConfig, ScoringConfig, SummitConfig,
};
pub use error::{ActionError, ActionResult};
pub use score::{compute_delta, ScoreOutcome};
pub use types::{ActionKind, ActionParams, ActionReceipt, ActionRequest, LedgerEntry, Nonce, Outcome, TimestampMs, UserId};
