//! Fixed-width binary codec for ledger entries.
//!
//! Little-endian throughout. The layout is append-only versioned: adding a
//! field means a new ledger format version, never an in-place change.

use summit_core::{ActionKind, LedgerEntry, Outcome, UserId};

/// Encoded size of one entry payload.
///
/// Layout: user(8) kind(1) delta(8) total(8) server_ts(8) nonce(8) outcome(1).
pub const ENTRY_LEN: usize = 42;

/// Encodes an entry into its fixed-width payload.
#[must_use]
pub fn encode_entry(entry: &LedgerEntry) -> [u8; ENTRY_LEN] {
    let mut buf = [0u8; ENTRY_LEN];
    buf[0..8].copy_from_slice(&entry.user_id.0.to_le_bytes());
    buf[8] = entry.kind as u8;
    buf[9..17].copy_from_slice(&entry.delta.to_le_bytes());
    buf[17..25].copy_from_slice(&entry.resulting_total.to_le_bytes());
    buf[25..33].copy_from_slice(&entry.server_timestamp_ms.to_le_bytes());
    buf[33..41].copy_from_slice(&entry.nonce.to_le_bytes());
    buf[41] = entry.outcome as u8;
    buf
}

/// Decodes an entry payload. Returns `None` on any malformed field.
#[must_use]
pub fn decode_entry(data: &[u8]) -> Option<LedgerEntry> {
    if data.len() != ENTRY_LEN {
        return None;
    }
    Some(LedgerEntry {
        user_id: UserId(u64::from_le_bytes(data[0..8].try_into().ok()?)),
        kind: ActionKind::from_u8(data[8])?,
        delta: i64::from_le_bytes(data[9..17].try_into().ok()?),
        resulting_total: u64::from_le_bytes(data[17..25].try_into().ok()?),
        server_timestamp_ms: u64::from_le_bytes(data[25..33].try_into().ok()?),
        nonce: u64::from_le_bytes(data[33..41].try_into().ok()?),
        outcome: Outcome::from_u8(data[41])?,
    })
}
