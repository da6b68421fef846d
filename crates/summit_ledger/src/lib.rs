//! # SUMMIT Ledger - The Source of Truth
//!
//! Append-only, crash-safe score ledger.
//!
//! Every accepted action is appended here BEFORE the ranking engine applies
//! it (write-ahead discipline). On cold start the ranking engine is rebuilt
//! from [`LedgerStore::load_all`], which makes the in-memory ranking a
//! derived cache rather than a second source of truth.
//!
//! ## Guarantees
//!
//! 1. **Durability**: once `append()` returns, the entry is flushed to disk
//! 2. **Idempotency**: re-appending a (user, nonce) pair is a no-op
//! 3. **Recovery**: a torn or corrupt tail stops the scan at the last good
//!    record instead of failing the boot
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "SLGR"]
//! [4 bytes: version]
//! [8 bytes: checkpoint sequence number]
//!
//! Record format:
//! [8 bytes: sequence number]
//! [4 bytes: payload length]
//! [N bytes: payload (encoded entry)]
//! [4 bytes: CRC32 of above]
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod store;

pub use codec::{decode_entry, encode_entry, ENTRY_LEN};
pub use error::{LedgerError, LedgerResult};
pub use store::{FileLedger, LedgerStore, MemoryLedger};
