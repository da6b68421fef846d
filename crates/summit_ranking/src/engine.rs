//! The authoritative ranking engine.
//!
//! One serialized writer owns the treap and the totals map; readers only
//! ever see immutable snapshots. Callers never touch the backing structure
//! directly — `upsert`, `rank`, `top_n` and `snapshot` are the entire
//! mutation/read surface.

use crate::snapshot::RankingSnapshot;
use crate::treap::{RankKey, Treap};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use summit_core::{LedgerEntry, UserId};

/// Fixed priority seed: rebuilds of the same history produce the same tree.
const TREAP_SEED: u64 = 0x5155_4D4D_4954_0001;

/// Result of one committed upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// 1-based rank before the update, if the user was already ranked.
    pub previous_rank: Option<u64>,
    /// 1-based rank after the update.
    pub new_rank: u64,
    /// Generation current after this update.
    pub generation: u64,
    /// True when the top-N window changed (and the generation advanced).
    pub top_changed: bool,
}

/// Writer-side state: the treap and totals map must change together.
struct EngineInner {
    treap: Treap,
    totals: HashMap<u64, u64>,
}

/// Serialized-writer ranking engine over an order-statistics treap.
pub struct RankingEngine {
    inner: Mutex<EngineInner>,
    top_n: usize,
    generation: AtomicU64,
    snapshot: RwLock<Arc<RankingSnapshot>>,
}

impl RankingEngine {
    /// Creates an empty engine with a top-N window of `top_n`.
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                treap: Treap::new(TREAP_SEED),
                totals: HashMap::new(),
            }),
            top_n: top_n.max(1),
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(Arc::new(RankingSnapshot::default())),
        }
    }

    /// Rebuilds an engine from committed ledger entries (cold start).
    ///
    /// Entries arrive in append order; the last `resulting_total` per user
    /// wins. The ledger is the source of truth — this engine is a cache.
    #[must_use]
    pub fn rebuild(top_n: usize, entries: &[LedgerEntry]) -> Self {
        let engine = Self::new(top_n);
        {
            let mut inner = engine.inner.lock();
            for entry in entries {
                if let Some(old_total) = inner.totals.get(&entry.user_id.0).copied() {
                    inner.treap.remove(RankKey { score: old_total, user: entry.user_id.0 });
                }
                inner.treap.insert(RankKey {
                    score: entry.resulting_total,
                    user: entry.user_id.0,
                });
                inner.totals.insert(entry.user_id.0, entry.resulting_total);
            }
            let window = Self::window(&inner, engine.top_n);
            if !window.is_empty() {
                engine.generation.store(1, Ordering::SeqCst);
                *engine.snapshot.write() = Arc::new(RankingSnapshot {
                    generation: 1,
                    entries: window,
                });
            }
        }
        engine
    }

    /// Updates (or inserts) a user's total and republishes the snapshot if
    /// the top-N window changed.
    pub fn upsert(&self, user_id: UserId, new_total: u64) -> UpsertOutcome {
        let mut inner = self.inner.lock();

        let previous_total = inner.totals.get(&user_id.0).copied();
        let previous_rank = previous_total
            .and_then(|total| inner.treap.rank_of(RankKey { score: total, user: user_id.0 }));

        if let Some(total) = previous_total {
            inner.treap.remove(RankKey { score: total, user: user_id.0 });
        }
        inner.treap.insert(RankKey { score: new_total, user: user_id.0 });
        inner.totals.insert(user_id.0, new_total);

        let new_rank = inner
            .treap
            .rank_of(RankKey { score: new_total, user: user_id.0 })
            .unwrap_or(u64::MAX); // Unreachable: the key was just inserted.

        let window = Self::window(&inner, self.top_n);
        let current = self.snapshot.read().clone();
        let top_changed = window != current.entries;

        let generation = if top_changed {
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *self.snapshot.write() = Arc::new(RankingSnapshot { generation, entries: window });
            generation
        } else {
            self.generation.load(Ordering::SeqCst)
        };

        UpsertOutcome { previous_rank, new_rank, generation, top_changed }
    }

    /// 1-based rank of a user across ALL participants.
    #[must_use]
    pub fn rank(&self, user_id: UserId) -> Option<u64> {
        let inner = self.inner.lock();
        let total = inner.totals.get(&user_id.0).copied()?;
        inner.treap.rank_of(RankKey { score: total, user: user_id.0 })
    }

    /// A user's committed total.
    #[must_use]
    pub fn total(&self, user_id: UserId) -> Option<u64> {
        self.inner.lock().totals.get(&user_id.0).copied()
    }

    /// The `k` best (user, total) pairs. `k` is clamped to the window size.
    #[must_use]
    pub fn top_n(&self, k: usize) -> Vec<(UserId, u64)> {
        let snapshot = self.snapshot.read().clone();
        snapshot.entries.iter().take(k).copied().collect()
    }

    /// The current immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RankingSnapshot> {
        self.snapshot.read().clone()
    }

    /// Total number of ranked participants.
    #[must_use]
    pub fn participants(&self) -> usize {
        self.inner.lock().treap.len()
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn window(inner: &EngineInner, top_n: usize) -> Vec<(UserId, u64)> {
        inner
            .treap
            .first_k(top_n)
            .into_iter()
            .map(|key| (UserId(key.user), key.score))
            .collect()
    }
}
