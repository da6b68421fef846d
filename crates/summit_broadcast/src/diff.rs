//! Snapshot differ.

use crate::events::{RankChange, RankEvent};
use std::collections::HashMap;
use summit_ranking::RankingSnapshot;

/// Computes the minimal delta between two consecutive top-N snapshots.
///
/// Events are stamped with the NEW snapshot's generation and ordered
/// best-rank-first, with departures last.
#[must_use]
pub fn diff_snapshots(previous: &RankingSnapshot, next: &RankingSnapshot) -> Vec<RankEvent> {
    let previous_ranks: HashMap<_, _> = previous
        .entries
        .iter()
        .enumerate()
        .map(|(index, (user, _))| (*user, index as u64 + 1))
        .collect();

    let mut events = Vec::new();

    for (index, (user, _)) in next.entries.iter().enumerate() {
        let rank = index as u64 + 1;
        match previous_ranks.get(user) {
            None => events.push(RankEvent {
                generation: next.generation,
                change: RankChange::Entered { user: *user, rank },
            }),
            Some(&old_rank) if old_rank != rank => events.push(RankEvent {
                generation: next.generation,
                change: RankChange::Moved { user: *user, old_rank, new_rank: rank },
            }),
            Some(_) => {}
        }
    }

    for (user, _) in &previous.entries {
        if !next.contains(*user) {
            events.push(RankEvent {
                generation: next.generation,
                change: RankChange::Left { user: *user },
            });
        }
    }

    events
}
