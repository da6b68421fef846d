//! Broadcast event types.

use std::sync::Arc;
use summit_core::UserId;
use summit_ranking::RankingSnapshot;

/// A minimal ranking delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankChange {
    /// User entered the top-N window.
    Entered {
        /// Who entered.
        user: UserId,
        /// Their new 1-based rank.
        rank: u64,
    },
    /// User left the top-N window.
    Left {
        /// Who left.
        user: UserId,
    },
    /// User moved within the top-N window.
    Moved {
        /// Who moved.
        user: UserId,
        /// Rank before the commit.
        old_rank: u64,
        /// Rank after the commit.
        new_rank: u64,
    },
    /// Score churn outside the top-N window (batched delivery class).
    ScoreChanged {
        /// Whose score changed.
        user: UserId,
        /// New total.
        total: u64,
        /// 1-based rank across all participants.
        rank: u64,
    },
}

impl RankChange {
    /// The user this change is about. Coalescing keys on this.
    #[must_use]
    pub const fn user(&self) -> UserId {
        match self {
            Self::Entered { user, .. }
            | Self::Left { user }
            | Self::Moved { user, .. }
            | Self::ScoreChanged { user, .. } => *user,
        }
    }
}

/// A generation-stamped delta event delivered to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankEvent {
    /// Ranking generation this event describes.
    pub generation: u64,
    /// The delta.
    pub change: RankChange,
}

/// What the pipeline hands the broadcaster after each commit.
#[derive(Clone, Debug)]
pub struct CommitNotice {
    /// Snapshot current after the commit.
    pub snapshot: Arc<RankingSnapshot>,
    /// The user whose action committed.
    pub actor: UserId,
    /// The actor's total after the commit.
    pub actor_total: u64,
    /// The actor's 1-based rank across all participants.
    pub actor_rank: u64,
}
