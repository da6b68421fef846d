//! Ledger store contract and the two shipped implementations.

use crate::codec::{decode_entry, encode_entry};
use crate::error::{LedgerError, LedgerResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use summit_core::LedgerEntry;

/// Magic bytes identifying a ledger file.
const LEDGER_MAGIC: &[u8; 4] = b"SLGR";

/// Current ledger format version.
const LEDGER_VERSION: u32 = 1;

/// Header size: magic + version + checkpoint sequence.
const HEADER_LEN: u64 = 16;

/// Contract the pipeline holds against durable storage.
///
/// `append` is at-least-once with idempotency by (user, nonce): calling it
/// twice with the same entry is absorbed, never duplicated. `load_all`
/// returns committed entries in append order for cold-start rebuild.
pub trait LedgerStore: Send + Sync {
    /// Durably appends an entry. When this returns `Ok`, the entry survives
    /// a crash.
    fn append(&self, entry: &LedgerEntry) -> LedgerResult<()>;

    /// Loads every committed entry in append order.
    fn load_all(&self) -> LedgerResult<Vec<LedgerEntry>>;
}

/// Writer-side state guarded by one lock: the idempotency set and the file
/// handle must change together.
struct FileInner {
    writer: BufWriter<File>,
    seen: HashSet<(u64, u64)>,
}

/// File-backed append-only ledger.
///
/// One CRC-framed record per entry. Appends are serialized; `load_all`
/// re-reads the file independently of the writer.
pub struct FileLedger {
    path: PathBuf,
    next_sequence: AtomicU64,
    inner: Mutex<FileInner>,
}

impl FileLedger {
    /// Opens or creates a ledger file, recovering existing records.
    ///
    /// Recovery scans to the last intact record; a torn tail is logged and
    /// ignored so a crash mid-append never blocks the next boot.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| LedgerError::io(&e))?;

        let metadata = file.metadata().map_err(|e| LedgerError::io(&e))?;
        let mut writer = BufWriter::new(file);

        if metadata.len() == 0 {
            writer.write_all(LEDGER_MAGIC).map_err(|e| LedgerError::io(&e))?;
            writer
                .write_all(&LEDGER_VERSION.to_le_bytes())
                .map_err(|e| LedgerError::io(&e))?;
            writer.write_all(&0u64.to_le_bytes()).map_err(|e| LedgerError::io(&e))?;
            writer.flush().map_err(|e| LedgerError::io(&e))?;
        }

        let ledger = Self {
            path,
            next_sequence: AtomicU64::new(0),
            inner: Mutex::new(FileInner { writer, seen: HashSet::new() }),
        };
        ledger.recover()?;
        Ok(ledger)
    }

    /// Rebuilds the idempotency set and sequence counter from disk.
    fn recover(&self) -> LedgerResult<()> {
        let (entries, checkpoint_sequence, max_sequence) = scan(&self.path)?;

        let mut inner = self.inner.lock();
        for entry in &entries {
            inner.seen.insert((entry.user_id.0, entry.nonce));
        }
        self.next_sequence
            .store(max_sequence.max(checkpoint_sequence) + 1, Ordering::SeqCst);

        if !entries.is_empty() {
            tracing::debug!(records = entries.len(), "ledger recovered");
        }
        Ok(())
    }

    /// Truncates the file back to its header after external state capture.
    ///
    /// The checkpoint sequence is preserved in the header so sequence
    /// numbers stay monotone across truncations.
    pub fn checkpoint(&self) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        let sequence = self.next_sequence.load(Ordering::SeqCst);

        // Append-mode handles cannot rewrite the header; reopen for update.
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io(&e))?;
        let mut header = BufWriter::new(file);
        header.seek(SeekFrom::Start(0)).map_err(|e| LedgerError::io(&e))?;
        header.write_all(LEDGER_MAGIC).map_err(|e| LedgerError::io(&e))?;
        header
            .write_all(&LEDGER_VERSION.to_le_bytes())
            .map_err(|e| LedgerError::io(&e))?;
        header.write_all(&sequence.to_le_bytes()).map_err(|e| LedgerError::io(&e))?;
        header.flush().map_err(|e| LedgerError::io(&e))?;
        header
            .get_ref()
            .set_len(HEADER_LEN)
            .map_err(|e| LedgerError::io(&e))?;

        inner.seen.clear();
        Ok(())
    }
}

impl LedgerStore for FileLedger {
    fn append(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        let mut inner = self.inner.lock();

        // Idempotent retry: the first append already committed.
        if inner.seen.contains(&(entry.user_id.0, entry.nonce)) {
            return Ok(());
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let payload = encode_entry(entry);

        let mut frame = Vec::with_capacity(8 + 4 + payload.len() + 4);
        frame.extend_from_slice(&sequence.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        inner.writer.write_all(&frame).map_err(|e| LedgerError::io(&e))?;
        inner.writer.flush().map_err(|e| LedgerError::io(&e))?;
        inner
            .writer
            .get_ref()
            .sync_all()
            .map_err(|e| LedgerError::io(&e))?;

        inner.seen.insert((entry.user_id.0, entry.nonce));
        Ok(())
    }

    fn load_all(&self) -> LedgerResult<Vec<LedgerEntry>> {
        let (entries, _, _) = scan(&self.path)?;
        Ok(entries)
    }
}

/// Scans a ledger file. Returns (entries, checkpoint sequence, max sequence).
///
/// Stops at the first torn or corrupt record: everything before it is
/// committed truth, everything after never finished its append.
fn scan(path: &Path) -> LedgerResult<(Vec<LedgerEntry>, u64, u64)> {
    let file = File::open(path).map_err(|e| LedgerError::io(&e))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|e| LedgerError::io(&e))?;
    if &magic != LEDGER_MAGIC {
        return Err(LedgerError::BadHeader("bad magic".to_string()));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes).map_err(|e| LedgerError::io(&e))?;
    let version = u32::from_le_bytes(version_bytes);
    if version != LEDGER_VERSION {
        return Err(LedgerError::BadHeader(format!("unsupported version {version}")));
    }

    let mut checkpoint_bytes = [0u8; 8];
    reader.read_exact(&mut checkpoint_bytes).map_err(|e| LedgerError::io(&e))?;
    let checkpoint_sequence = u64::from_le_bytes(checkpoint_bytes);

    let mut entries = Vec::new();
    let mut max_sequence = 0u64;

    loop {
        match read_record(&mut reader) {
            Ok(Some((sequence, entry))) => {
                max_sequence = max_sequence.max(sequence);
                entries.push(entry);
            }
            Ok(None) => break, // Clean end of file.
            Err(_) => {
                tracing::warn!(
                    recovered = entries.len(),
                    "ledger scan stopped at torn tail record"
                );
                break;
            }
        }
    }

    Ok((entries, checkpoint_sequence, max_sequence))
}

/// Reads one framed record. `Ok(None)` at clean EOF, `Err` on a torn or
/// corrupt frame.
fn read_record(reader: &mut BufReader<File>) -> LedgerResult<Option<(u64, LedgerEntry)>> {
    let mut sequence_bytes = [0u8; 8];
    match reader.read_exact(&mut sequence_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(LedgerError::io(&e)),
    }
    let sequence = u64::from_le_bytes(sequence_bytes);

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).map_err(|e| LedgerError::io(&e))?;
    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len != crate::codec::ENTRY_LEN {
        return Err(LedgerError::Corrupt { sequence });
    }

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).map_err(|e| LedgerError::io(&e))?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes).map_err(|e| LedgerError::io(&e))?;
    let stored_crc = u32::from_le_bytes(crc_bytes);

    let mut frame = Vec::with_capacity(8 + 4 + payload.len());
    frame.extend_from_slice(&sequence_bytes);
    frame.extend_from_slice(&len_bytes);
    frame.extend_from_slice(&payload);
    if crc32fast::hash(&frame) != stored_crc {
        return Err(LedgerError::Corrupt { sequence });
    }

    let entry = decode_entry(&payload).ok_or(LedgerError::Corrupt { sequence })?;
    Ok(Some((sequence, entry)))
}

/// In-memory ledger for tests and simulations.
///
/// Honors the same idempotency contract as [`FileLedger`] and adds failure
/// injection so callers can exercise the transient-error path.
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    seen: Mutex<HashSet<(u64, u64)>>,
    fail: AtomicBool,
}

impl MemoryLedger {
    /// Creates an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `append` fails with [`LedgerError::Unavailable`]
    /// until cleared. Committed entries are unaffected.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail.store(unavailable, Ordering::SeqCst);
    }

    /// Number of committed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LedgerStore for MemoryLedger {
    fn append(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable);
        }
        let mut seen = self.seen.lock();
        if !seen.insert((entry.user_id.0, entry.nonce)) {
            return Ok(());
        }
        self.entries.lock().push(*entry);
        Ok(())
    }

    fn load_all(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.entries.lock().clone())
    }
}
