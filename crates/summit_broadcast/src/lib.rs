//! # SUMMIT Broadcast - The Outbound Fan-Out
//!
//! Diffs consecutive top-N snapshots into minimal delta events and fans
//! them out to subscribers.
//!
//! ## Event Flow
//!
//! ```text
//! Ranking commit ──► CommitNotice ──► bounded channel ──► worker thread
//!                                                             │
//!                             ┌───────────────────────────────┤
//!                             ▼                               ▼
//!                     diff vs previous                 per-subscriber
//!                     snapshot                         delivery state
//!                             │                               │
//!                     entered/left/moved              throttle + coalesce
//!                     (Immediate)                     batched flush tick
//! ```
//!
//! The hand-off into the channel is non-blocking: under backpressure a
//! notice is dropped (and logged) rather than ever delaying a ranking
//! commit. Subscribers observe at-most-once delivery in non-decreasing
//! generation order; superseded updates are coalesced away.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod diff;
pub mod events;
pub mod fanout;

pub use diff::diff_snapshots;
pub use events::{CommitNotice, RankChange, RankEvent};
pub use fanout::{Broadcaster, Subscription};
