//! # SUMMIT - Authoritative Score Pipeline
//!
//! Accepts score-affecting actions from untrusted clients, validates them
//! through hard boundaries, computes the authoritative score server-side,
//! maintains the live top-N ranking and streams ranking deltas to
//! subscribers.
//!
//! ## Data Flow
//!
//! ```text
//! client ──► IngestGate ──► RateLimiter ──► ScoreCalculator
//!                 │                               │
//!            typed errors                         ▼
//!                 ◄──────────────────── AntiCheatEvaluator
//!                                                 │ accept
//!                                                 ▼
//!                     ledger append (durable) ──► RankingEngine
//!                                                 │
//!                                                 ▼ async
//!                                           Broadcaster ──► subscribers
//! ```
//!
//! Control flow is synchronous through the ranking commit; broadcast is
//! fire-and-forget. The former multi-service topology lives on as
//! in-process components behind typed interfaces - same trust boundaries,
//! no network between them.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod gate;
pub mod pipeline;

pub use auth::{AuthClaims, CredentialVerifier, TokenTable};
pub use gate::{IngestGate, SessionContext};
pub use pipeline::{LeaderboardView, Pipeline};
