//! Commit Pair Deduplication
//!
//! Tracks which unordered commit pairs were already claimed for mining so that
//! history shared between branches is processed at most once per run. A single
//! commit is claimed as the degenerate pair `{id, id}`, which no pair of
//! distinct commits can collide with.

use dashmap::DashSet;

/// Concurrent, symmetric set of claimed commit id pairs.
///
/// Pairs are stored in canonical `(low, high)` order, so `claim(a, b)` and
/// `claim(b, a)` address the same entry. The set only grows during a run.
#[derive(Debug, Default)]
pub struct CommitPairDeduplicator {
    claimed: DashSet<(u32, u32)>,
}

fn canonical(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl CommitPairDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the unordered pair `{a, b}`. Returns `true` only for the first claim.
    pub fn claim(&self, a: u32, b: u32) -> bool {
        self.claimed.insert(canonical(a, b))
    }

    /// Whether `{a, b}` has been claimed. Never mutates the set.
    pub fn is_claimed(&self, a: u32, b: u32) -> bool {
        self.claimed.contains(&canonical(a, b))
    }

    /// Whether the single commit `id` has been claimed
    pub fn is_commit_claimed(&self, id: u32) -> bool {
        self.is_claimed(id, id)
    }

    /// Number of distinct pairs claimed so far
    pub fn claimed_pairs(&self) -> usize {
        self.claimed.len()
    }
}
