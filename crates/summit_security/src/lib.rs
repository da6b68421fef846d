//! # SUMMIT Security - The Black Box
//!
//! Integrity, admission and anomaly decisions for the action pipeline.
//!
//! ## Philosophy
//!
//! NEVER trust the client. The client says "I earned this score". We verify:
//! 1. Is the request really from the key holder? (keyed digest)
//! 2. Have we seen it before? (nonce + timestamp ordering)
//! 3. Is the client within its admission budget? (sliding window)
//! 4. Is the behavior humanly plausible? (risk state machine)
//!
//! ## Architecture
//!
//! ```text
//! ActionRequest ──► signature ──► replay ──► rate limit ──► anti-cheat
//!                      │             │            │              │
//!                 IntegrityError IntegrityError RateLimited  AnomalyRejected
//!                                                             / Suspended
//! ```
//!
//! Every stage is a pure state machine over explicit `now_ms` inputs; no
//! stage reads a clock or performs I/O.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod anti_cheat;
pub mod rate_limit;
pub mod replay;
pub mod signature;

pub use anti_cheat::{AntiCheatEvaluator, Evaluation, ReasonCode, RiskProfile, Verdict};
pub use rate_limit::{RateLimiter, RateRejection};
pub use replay::ReplayWindow;
pub use signature::{KeyRegistry, SigningKey};
