//! Immutable, generation-stamped leaderboard snapshots.

use summit_core::UserId;

/// The top-N window at one specific generation.
///
/// Snapshots are immutable: a mutation that changes the window produces a
/// NEW snapshot with a higher generation. Readers holding an `Arc` of an
/// old snapshot keep a consistent view for as long as they need it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RankingSnapshot {
    /// Generation that produced this window.
    pub generation: u64,
    /// (user, total) pairs, best first.
    pub entries: Vec<(UserId, u64)>,
}

impl RankingSnapshot {
    /// 1-based rank of a user inside this window, if present.
    #[must_use]
    pub fn rank_of(&self, user_id: UserId) -> Option<u64> {
        self.entries
            .iter()
            .position(|(user, _)| *user == user_id)
            .map(|index| index as u64 + 1)
    }

    /// True when the user is inside the window.
    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.rank_of(user_id).is_some()
    }
}
