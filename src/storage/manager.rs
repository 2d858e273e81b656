//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Hand out immutable table lists that snapshots can pin

use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, TideError};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTableBuilder, SSTableReader};

/// Suffix of a table still being written
const TMP_EXTENSION: &str = "tmp";

/// Open SSTables ordered newest → oldest
pub type TableList = Arc<Vec<Arc<SSTableReader>>>;

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: the current list is swapped, never mutated in place, so a
///   list handed out earlier stays valid for as long as someone holds it
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct StorageManager {
    data_dir: PathBuf,
    sstables: RwLock<TableList>,
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Delete `.tmp` leftovers of flushes interrupted by a crash
    /// 3. Discover existing SSTable files
    /// 4. Open readers for each (loads indexes into RAM)
    /// 5. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().map_or(false, |ext| ext == TMP_EXTENSION) {
                tracing::warn!(file = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
            } else if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let reader = SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?;
            sstables.push(Arc::new(reader));
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);
        tracing::debug!(dir = %path.display(), tables = sstables.len(), "storage opened");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(Arc::new(sstables)),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Current table list (newest first)
    pub fn tables(&self) -> TableList {
        Arc::clone(&self.sstables.read())
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Writes the MemTable's latest versions to `<name>.sst.tmp`, syncs it and
    /// renames it into place, so a table under its final name is always
    /// complete. Then opens a reader for it and publishes a new list with it
    /// at the front. Returns that list.
    pub fn flush(&self, memtable: &MemTable) -> Result<TableList> {
        if memtable.is_empty() {
            return Err(TideError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);
        let tmp_path = path.with_extension(format!("sst.{}", TMP_EXTENSION));

        let mut builder = SSTableBuilder::new(&tmp_path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let metadata = builder.finish()?;
        fs::rename(&tmp_path, &path)?;
        sync_dir(&self.data_dir)?;
        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "memtable flushed to SSTable"
        );

        let reader = Arc::new(SSTableReader::open(&path)?);

        let mut sstables = self.sstables.write();
        let mut next = Vec::with_capacity(sstables.len() + 1);
        next.push(reader);
        next.extend(sstables.iter().cloned());
        *sstables = Arc::new(next);
        Ok(Arc::clone(&sstables))
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}

/// Make a rename inside `dir` durable
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Point lookup across a pinned table list, newest first
///
/// `Some(Tombstone)` means the newest table holding the key deleted it.
pub fn lookup(tables: &[Arc<SSTableReader>], key: &[u8]) -> Result<Option<MemTableEntry>> {
    for reader in tables {
        if !reader.might_contain(key) {
            continue;
        }
        match reader.get(key) {
            Ok(Some(value)) => return Ok(Some(MemTableEntry::Value(value))),
            Ok(None) => return Ok(Some(MemTableEntry::Tombstone)),
            Err(TideError::KeyNotFound) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Nearest key after / at `from` across a pinned table list, with the entry
/// from the newest table holding it
pub fn seek(
    tables: &[Arc<SSTableReader>],
    from: Bound<&[u8]>,
    reverse: bool,
) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
    let mut best: Option<(Vec<u8>, MemTableEntry)> = None;
    for reader in tables {
        let Some((key, value)) = reader.seek(from, reverse)? else {
            continue;
        };
        let closer = match &best {
            None => true,
            Some((best_key, _)) if reverse => key > *best_key,
            // Equal keys keep the earlier (newer) table's entry
            Some((best_key, _)) => key < *best_key,
        };
        if closer {
            let entry = value.map_or(MemTableEntry::Tombstone, MemTableEntry::Value);
            best = Some((key, entry));
        }
    }
    Ok(best)
}
