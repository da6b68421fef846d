//! # SUMMIT Ranking - The Authoritative Order
//!
//! A total order over all participants, keyed by (total score descending,
//! user id ascending). The tie-break is part of the contract: two equal
//! totals always rank in the same deterministic order on every node and
//! after every rebuild.
//!
//! ## Structure
//!
//! ```text
//!              upsert(user, total)         top_n() / rank(user)
//!                     │                          │
//!                     ▼                          ▼
//!            ┌─────────────────┐        ┌──────────────────┐
//!            │  serialized     │ ─────► │ immutable        │
//!            │  writer (treap) │  swap  │ snapshot + gen   │
//!            └─────────────────┘        └──────────────────┘
//! ```
//!
//! The backing structure is an order-statistics treap over an index arena:
//! O(log n) upsert and rank, O(k + log n) top-k, no unsafe code, and
//! deterministic seeded priorities so identical histories build identical
//! trees.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod engine;
pub mod snapshot;
pub mod treap;

pub use engine::{RankingEngine, UpsertOutcome};
pub use snapshot::RankingSnapshot;
