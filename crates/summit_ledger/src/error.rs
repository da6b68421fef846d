//! # Ledger Error Types

use thiserror::Error;

/// Errors that can occur in the ledger store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Underlying I/O failure. Safe to retry; nothing partial is visible.
    #[error("ledger I/O failed: {0}")]
    Io(String),

    /// File header is not a ledger, or an unsupported version.
    #[error("not a ledger file: {0}")]
    BadHeader(String),

    /// A record failed its CRC or length check mid-file.
    #[error("corrupt record at sequence {sequence}")]
    Corrupt {
        /// Sequence number of the bad record.
        sequence: u64,
    },

    /// Store is deliberately unavailable (used by failure injection).
    #[error("ledger unavailable")]
    Unavailable,
}

impl LedgerError {
    /// Wraps an I/O error, keeping only the display text.
    pub fn io(error: &std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
