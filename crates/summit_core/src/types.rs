//! Core domain types for the score pipeline.
//!
//! These types cross every trust boundary in the workspace. The SERVER is
//! the only authority: an [`ActionRequest`] is untrusted input, a
//! [`LedgerEntry`] is committed truth.

use serde::{Deserialize, Serialize};

/// Milliseconds since the UNIX epoch.
pub type TimestampMs = u64;

/// Single-use token distinguishing one action request from a replay.
pub type Nonce = u64;

/// Unique identifier for a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Score-affecting actions a participant can submit.
///
/// The table is FIXED: an unknown discriminator on the wire is a
/// `ValidationError`, never a default.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Eliminated an opponent.
    Takedown = 0,
    /// Captured a contested objective.
    ObjectiveCapture = 1,
    /// Won a full round.
    RoundWin = 2,
    /// Claimed a bounty placed on another participant.
    BountyClaim = 3,
}

impl ActionKind {
    /// Number of action kinds in the fixed table.
    pub const COUNT: usize = 4;

    /// Converts from a wire discriminator.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Takedown),
            1 => Some(Self::ObjectiveCapture),
            2 => Some(Self::RoundWin),
            3 => Some(Self::BountyClaim),
            _ => None,
        }
    }

    /// Dense index for per-kind tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Client-declared action parameters.
///
/// Both fields are multiplier INPUTS, never score values. The calculator
/// bounds them; the gate rejects values outside the absolute sanity range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Declared difficulty tier (0 = baseline).
    pub difficulty_tier: u8,
    /// Declared streak count at the time of the action.
    pub streak: u32,
}

/// An inbound action request. Transient and UNTRUSTED; never persisted as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionRequest {
    /// Acting participant.
    pub user_id: UserId,
    /// What the client claims happened.
    pub kind: ActionKind,
    /// Declared multiplier inputs.
    pub params: ActionParams,
    /// Client wall clock at submission (milliseconds).
    pub client_timestamp_ms: TimestampMs,
    /// Single-use replay token, unique per user.
    pub nonce: Nonce,
    /// Keyed digest over [`ActionRequest::canonical_bytes`].
    pub signature: u128,
}

/// Size of the canonical request encoding in bytes.
pub const CANONICAL_LEN: usize = 30;

impl ActionRequest {
    /// Canonical little-endian encoding of the signed fields.
    ///
    /// Layout: user(8) kind(1) difficulty(1) streak(4) client_ts(8) nonce(8).
    /// The signature is computed over exactly these bytes; any field change
    /// invalidates it.
    #[must_use]
    pub fn canonical_bytes(&self) -> [u8; CANONICAL_LEN] {
        let mut buf = [0u8; CANONICAL_LEN];
        buf[0..8].copy_from_slice(&self.user_id.0.to_le_bytes());
        buf[8] = self.kind as u8;
        buf[9] = self.params.difficulty_tier;
        buf[10..14].copy_from_slice(&self.params.streak.to_le_bytes());
        buf[14..22].copy_from_slice(&self.client_timestamp_ms.to_le_bytes());
        buf[22..30].copy_from_slice(&self.nonce.to_le_bytes());
        buf
    }
}

/// Commit outcome recorded in the ledger.
///
/// Both variants apply the delta; `Review` additionally marks the entry for
/// operator sampling. Rejected actions never reach the ledger.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    /// Accepted cleanly.
    #[default]
    Accepted = 0,
    /// Accepted, flagged for review (risk in the warning band).
    Review = 1,
}

impl Outcome {
    /// Converts from a stored discriminator.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Accepted),
            1 => Some(Self::Review),
            _ => None,
        }
    }
}

/// An immutable, committed score change. The ledger is the source of truth
/// for all totals; the ranking engine is a cache rebuilt from these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Participant whose total changed.
    pub user_id: UserId,
    /// Action that produced the change.
    pub kind: ActionKind,
    /// Computed score delta (server-computed, never client-supplied).
    pub delta: i64,
    /// Total after applying the delta (saturating at zero).
    pub resulting_total: u64,
    /// Server wall clock at commit.
    pub server_timestamp_ms: TimestampMs,
    /// Nonce of the originating request, for idempotent retries.
    pub nonce: Nonce,
    /// Accept/review outcome.
    pub outcome: Outcome,
}

/// Successful submission response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionReceipt {
    /// Score increase granted by this action.
    pub delta: i64,
    /// New authoritative total.
    pub new_total: u64,
    /// 1-based rank after the commit.
    pub new_rank: u64,
    /// 1-based rank before the commit, if the user was already ranked.
    pub previous_rank: Option<u64>,
    /// Ranking generation produced by the commit.
    pub generation: u64,
    /// True when the action was accepted inside the review band.
    pub review: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_roundtrip() {
        for i in 0..ActionKind::COUNT as u8 {
            let kind = ActionKind::from_u8(i).unwrap();
            assert_eq!(kind as u8, i);
        }
        assert!(ActionKind::from_u8(ActionKind::COUNT as u8).is_none());
    }

    #[test]
    fn test_canonical_bytes_cover_every_field() {
        let base = ActionRequest {
            user_id: UserId(7),
            kind: ActionKind::Takedown,
            params: ActionParams { difficulty_tier: 2, streak: 3 },
            client_timestamp_ms: 1_000,
            nonce: 42,
            signature: 0,
        };

        let mutations = [
            ActionRequest { user_id: UserId(8), ..base },
            ActionRequest { kind: ActionKind::RoundWin, ..base },
            ActionRequest { params: ActionParams { difficulty_tier: 3, streak: 3 }, ..base },
            ActionRequest { params: ActionParams { difficulty_tier: 2, streak: 4 }, ..base },
            ActionRequest { client_timestamp_ms: 1_001, ..base },
            ActionRequest { nonce: 43, ..base },
        ];

        for mutated in mutations {
            assert_ne!(base.canonical_bytes(), mutated.canonical_bytes());
        }
    }

    #[test]
    fn test_signature_excluded_from_canonical_bytes() {
        let a = ActionRequest {
            user_id: UserId(1),
            kind: ActionKind::BountyClaim,
            params: ActionParams::default(),
            client_timestamp_ms: 5,
            nonce: 9,
            signature: 0,
        };
        let b = ActionRequest { signature: u128::MAX, ..a };
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }
}
