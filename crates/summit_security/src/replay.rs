//! # Replay Protection
//!
//! Per-user nonce window plus timestamp ordering.
//!
//! A request is a replay when its nonce was already accepted within the
//! retention window, or when its client timestamp falls behind the last
//! accepted one by more than the tolerated clock skew.
//!
//! `check` and `commit` are deliberately separate: the gate checks early but
//! commits only after the WHOLE pipeline (through ranking) succeeds, so a
//! downstream rejection never burns the nonce of a legitimately retried
//! request.

use std::collections::{HashSet, VecDeque};
use summit_core::{Nonce, TimestampMs};

/// Per-user replay-protection state.
#[derive(Clone, Debug)]
pub struct ReplayWindow {
    /// Nonce retention window.
    retention_ms: u64,
    /// Tolerated client clock skew.
    skew_ms: u64,
    /// Accepted nonces still inside the retention window.
    nonces: HashSet<Nonce>,
    /// Expiry queue, oldest first.
    expirations: VecDeque<(TimestampMs, Nonce)>,
    /// Highest client timestamp ever accepted for this user.
    last_accepted_client_ts: TimestampMs,
}

impl ReplayWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new(retention_ms: u64, skew_ms: u64) -> Self {
        Self {
            retention_ms,
            skew_ms,
            nonces: HashSet::new(),
            expirations: VecDeque::new(),
            last_accepted_client_ts: 0,
        }
    }

    /// Returns true when the request passes replay and ordering checks.
    ///
    /// Does NOT record anything; see [`ReplayWindow::commit`].
    #[must_use]
    pub fn check(&mut self, nonce: Nonce, client_ts: TimestampMs, now_ms: TimestampMs) -> bool {
        self.evict(now_ms);

        if self.nonces.contains(&nonce) {
            return false;
        }
        // Too old: a fresh request never lags the last accepted one by more
        // than the skew tolerance.
        client_ts + self.skew_ms >= self.last_accepted_client_ts
    }

    /// Records an accepted request. Call only after the full pipeline
    /// committed.
    pub fn commit(&mut self, nonce: Nonce, client_ts: TimestampMs, now_ms: TimestampMs) {
        self.evict(now_ms);
        if self.nonces.insert(nonce) {
            self.expirations.push_back((now_ms + self.retention_ms, nonce));
        }
        self.last_accepted_client_ts = self.last_accepted_client_ts.max(client_ts);
    }

    /// Number of nonces currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.nonces.len()
    }

    fn evict(&mut self, now_ms: TimestampMs) {
        while let Some(&(expiry, nonce)) = self.expirations.front() {
            if expiry > now_ms {
                break;
            }
            self.expirations.pop_front();
            self.nonces.remove(&nonce);
        }
    }
}
