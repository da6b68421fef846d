//! Order-statistics treap over an index arena.
//!
//! Nodes live in a `Vec` and reference each other by index, so the whole
//! structure is safe Rust. Every node tracks its subtree size, which turns
//! rank lookup into a single root-to-node descent.
//!
//! Priorities come from a seeded ChaCha stream: identical insertion
//! histories produce identical trees, which keeps rebuild-from-ledger
//! reproducible.

use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;

/// Sentinel index for "no child".
const NIL: u32 = u32::MAX;

/// Ranking key: total score descending, user id ascending.
///
/// `RankKey` orders so that "less" means "ranked better": rank 1 is the
/// minimum key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankKey {
    /// Total score.
    pub score: u64,
    /// Owning user.
    pub user: u64,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score ranks earlier; equal scores break by lower user id.
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.user.cmp(&other.user))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, Debug)]
struct Node {
    key: RankKey,
    priority: u64,
    left: u32,
    right: u32,
    size: u32,
}

/// Order-statistics treap.
pub struct Treap {
    nodes: Vec<Node>,
    free: Vec<u32>,
    root: u32,
    rng: ChaCha8Rng,
}

impl Treap {
    /// Creates an empty treap with a fixed priority seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NIL,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subtree_size(self.root) as usize
    }

    /// True when no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Inserts a key. Returns false when the key is already present.
    pub fn insert(&mut self, key: RankKey) -> bool {
        if self.rank_of(key).is_some() {
            return false;
        }
        let priority = self.rng.next_u64();
        let index = self.alloc(key, priority);
        self.root = self.insert_at(self.root, index);
        true
    }

    /// Removes a key. Returns false when the key is absent.
    pub fn remove(&mut self, key: RankKey) -> bool {
        if self.rank_of(key).is_none() {
            return false;
        }
        self.root = self.remove_at(self.root, key);
        true
    }

    /// 1-based rank of a key: one plus the number of better-ranked keys.
    #[must_use]
    pub fn rank_of(&self, key: RankKey) -> Option<u64> {
        let mut node = self.root;
        let mut better = 0u64;
        while node != NIL {
            let n = &self.nodes[node as usize];
            match key.cmp(&n.key) {
                Ordering::Less => node = n.left,
                Ordering::Greater => {
                    better += u64::from(self.subtree_size(n.left)) + 1;
                    node = n.right;
                }
                Ordering::Equal => {
                    return Some(better + u64::from(self.subtree_size(n.left)) + 1);
                }
            }
        }
        None
    }

    /// The first `k` keys in rank order.
    #[must_use]
    pub fn first_k(&self, k: usize) -> Vec<RankKey> {
        let mut out = Vec::with_capacity(k.min(self.len()));
        // Explicit stack in-order walk, stopping at k keys.
        let mut stack = Vec::new();
        let mut node = self.root;
        while (node != NIL || !stack.is_empty()) && out.len() < k {
            while node != NIL {
                stack.push(node);
                node = self.nodes[node as usize].left;
            }
            let Some(index) = stack.pop() else { break };
            out.push(self.nodes[index as usize].key);
            node = self.nodes[index as usize].right;
        }
        out
    }

    fn subtree_size(&self, node: u32) -> u32 {
        if node == NIL {
            0
        } else {
            self.nodes[node as usize].size
        }
    }

    fn alloc(&mut self, key: RankKey, priority: u64) -> u32 {
        let node = Node { key, priority, left: NIL, right: NIL, size: 1 };
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = node;
            index
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as u32
        }
    }

    fn update_size(&mut self, node: u32) {
        let left = self.subtree_size(self.nodes[node as usize].left);
        let right = self.subtree_size(self.nodes[node as usize].right);
        self.nodes[node as usize].size = left + right + 1;
    }

    /// Rotation pulling the left child up.
    fn rotate_right(&mut self, node: u32) -> u32 {
        let pivot = self.nodes[node as usize].left;
        self.nodes[node as usize].left = self.nodes[pivot as usize].right;
        self.nodes[pivot as usize].right = node;
        self.update_size(node);
        self.update_size(pivot);
        pivot
    }

    /// Rotation pulling the right child up.
    fn rotate_left(&mut self, node: u32) -> u32 {
        let pivot = self.nodes[node as usize].right;
        self.nodes[node as usize].right = self.nodes[pivot as usize].left;
        self.nodes[pivot as usize].left = node;
        self.update_size(node);
        self.update_size(pivot);
        pivot
    }

    fn insert_at(&mut self, node: u32, new: u32) -> u32 {
        if node == NIL {
            return new;
        }
        let key = self.nodes[new as usize].key;
        if key < self.nodes[node as usize].key {
            let child = self.insert_at(self.nodes[node as usize].left, new);
            self.nodes[node as usize].left = child;
            self.update_size(node);
            if self.nodes[child as usize].priority > self.nodes[node as usize].priority {
                return self.rotate_right(node);
            }
        } else {
            let child = self.insert_at(self.nodes[node as usize].right, new);
            self.nodes[node as usize].right = child;
            self.update_size(node);
            if self.nodes[child as usize].priority > self.nodes[node as usize].priority {
                return self.rotate_left(node);
            }
        }
        node
    }

    fn remove_at(&mut self, node: u32, key: RankKey) -> u32 {
        if node == NIL {
            return NIL;
        }
        match key.cmp(&self.nodes[node as usize].key) {
            Ordering::Less => {
                let child = self.remove_at(self.nodes[node as usize].left, key);
                self.nodes[node as usize].left = child;
                self.update_size(node);
                node
            }
            Ordering::Greater => {
                let child = self.remove_at(self.nodes[node as usize].right, key);
                self.nodes[node as usize].right = child;
                self.update_size(node);
                node
            }
            Ordering::Equal => {
                let left = self.nodes[node as usize].left;
                let right = self.nodes[node as usize].right;
                match (left, right) {
                    (NIL, NIL) => {
                        self.free.push(node);
                        NIL
                    }
                    (NIL, child) | (child, NIL) => {
                        self.free.push(node);
                        child
                    }
                    _ => {
                        // Rotate the higher-priority child up, then recurse.
                        let new_root = if self.nodes[left as usize].priority
                            > self.nodes[right as usize].priority
                        {
                            self.rotate_right(node)
                        } else {
                            self.rotate_left(node)
                        };
                        let descend = if new_root == left {
                            let child = self.remove_at(self.nodes[new_root as usize].right, key);
                            self.nodes[new_root as usize].right = child;
                            new_root
                        } else {
                            let child = self.remove_at(self.nodes[new_root as usize].left, key);
                            self.nodes[new_root as usize].left = child;
                            new_root
                        };
                        self.update_size(descend);
                        descend
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(score: u64, user: u64) -> RankKey {
        RankKey { score, user }
    }

    #[test]
    fn test_higher_score_ranks_first() {
        let mut treap = Treap::new(7);
        assert!(treap.insert(key(100, 1)));
        assert!(treap.insert(key(300, 2)));
        assert!(treap.insert(key(200, 3)));

        assert_eq!(treap.rank_of(key(300, 2)), Some(1));
        assert_eq!(treap.rank_of(key(200, 3)), Some(2));
        assert_eq!(treap.rank_of(key(100, 1)), Some(3));
    }

    #[test]
    fn test_equal_scores_break_by_user_id() {
        let mut treap = Treap::new(7);
        treap.insert(key(500, 9));
        treap.insert(key(500, 3));
        treap.insert(key(500, 6));

        assert_eq!(
            treap.first_k(3),
            vec![key(500, 3), key(500, 6), key(500, 9)]
        );
    }

    #[test]
    fn test_duplicate_insert_refused() {
        let mut treap = Treap::new(7);
        assert!(treap.insert(key(100, 1)));
        assert!(!treap.insert(key(100, 1)));
        assert_eq!(treap.len(), 1);
    }

    #[test]
    fn test_remove_then_rank_shifts() {
        let mut treap = Treap::new(7);
        for user in 1..=5u64 {
            treap.insert(key(user * 10, user));
        }
        assert_eq!(treap.rank_of(key(10, 1)), Some(5));
        assert!(treap.remove(key(50, 5)));
        assert_eq!(treap.rank_of(key(10, 1)), Some(4));
        assert!(!treap.remove(key(50, 5)));
    }

    #[test]
    fn test_first_k_truncates() {
        let mut treap = Treap::new(7);
        for user in 1..=10u64 {
            treap.insert(key(user, user));
        }
        let top3 = treap.first_k(3);
        assert_eq!(top3, vec![key(10, 10), key(9, 9), key(8, 8)]);
        assert_eq!(treap.first_k(100).len(), 10);
    }

    #[test]
    fn test_randomized_against_reference_sort() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut treap = Treap::new(7);
        let mut reference: Vec<RankKey> = Vec::new();

        for round in 0..2_000u64 {
            if !reference.is_empty() && rng.gen_bool(0.3) {
                let victim = reference.remove(rng.gen_range(0..reference.len()));
                assert!(treap.remove(victim));
            } else {
                let k = key(rng.gen_range(0..500), round);
                if treap.insert(k) {
                    reference.push(k);
                }
            }
        }

        reference.sort();
        assert_eq!(treap.len(), reference.len());
        assert_eq!(treap.first_k(reference.len()), reference);
        for (i, k) in reference.iter().enumerate() {
            assert_eq!(treap.rank_of(*k), Some(i as u64 + 1));
        }
    }
}
