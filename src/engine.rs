//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Assign sequence numbers so readers can pin a point-in-time view
//! - Apply multi-key batches atomically
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{self, StorageManager, TableList};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Memtable + table list that were current together
struct Version {
    memtable: Arc<MemTable>,
    tables: TableList,
}

/// An immutable, point-in-time read view of the engine
///
/// Pins the memtable and table list that were current when it was taken and
/// filters memtable versions by sequence number. Dropping the last clone
/// releases the pinned state.
#[derive(Clone)]
pub struct View {
    memtable: Arc<MemTable>,
    tables: TableList,
    seq: u64,
}

impl View {
    /// Sequence number this view was taken at
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Point lookup: memtable first, then SSTables newest → oldest
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let entry = match self.memtable.get(key, self.seq) {
            Some(entry) => Some(entry),
            None => storage::lookup(&self.tables, key)?,
        };
        Ok(match entry {
            Some(MemTableEntry::Value(v)) => Some(v),
            Some(MemTableEntry::Tombstone) | None => None,
        })
    }

    /// Nearest live entry after / at `from` in the given direction
    ///
    /// Tombstones shadow older values and are skipped.
    pub fn seek(&self, from: Bound<&[u8]>, reverse: bool) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let mut bound: Bound<Vec<u8>> = match from {
            Bound::Included(k) => Bound::Included(k.to_vec()),
            Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
            Bound::Unbounded => Bound::Unbounded,
        };

        loop {
            let from = as_ref_bound(&bound);
            let mem = self.memtable.seek(from, reverse, self.seq);
            let disk = storage::seek(&self.tables, from, reverse)?;

            let (key, entry) = match (mem, disk) {
                (None, None) => return Ok(None),
                (Some(m), None) => m,
                (None, Some(d)) => d,
                (Some(m), Some(d)) => {
                    let mem_first = if reverse { m.0 >= d.0 } else { m.0 <= d.0 };
                    // On equal keys the memtable holds the newer version
                    if mem_first {
                        m
                    } else {
                        d
                    }
                }
            };

            match entry {
                MemTableEntry::Value(v) => return Ok(Some((key, v))),
                MemTableEntry::Tombstone => bound = Bound::Excluded(key),
            }
        }
    }
}

fn as_ref_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable → publish sequence
///
/// - **Reads**: take a [`View`] (brief read lock on `version`), then run
///   without blocking writers or each other
pub struct Engine {
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability
    wal: Mutex<WalWriter>,

    /// Current memtable + table list; swapped as a unit on flush
    version: RwLock<Version>,

    /// Persistent storage manager
    storage: StorageManager,

    /// Highest sequence number whose writes are fully applied
    last_seq: AtomicU64,

    /// Serializes write operations (put/delete/batch/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush recovered data, truncate WAL
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();
        let mut seq = 0u64;

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            let mut writes = Vec::new();
            for entry in entries {
                seq += 1;
                writes.clear();
                entry.operation.into_writes(&mut writes);
                for (key, value) in writes.drain(..) {
                    match value {
                        Some(v) => memtable.put(key, v, seq),
                        None => memtable.delete(key, seq),
                    };
                }
            }
        }

        // Make recovered data durable in an SSTable before the WAL is reset
        if !memtable.is_empty() {
            tracing::info!(
                entries = memtable.entry_count(),
                "flushing recovered entries to SSTable"
            );
            storage.flush(&memtable)?;
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        let tables = storage.tables();
        tracing::info!(
            data_dir = %config.data_dir.display(),
            sstables = tables.len(),
            "engine opened"
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            version: RwLock::new(Version {
                memtable: Arc::new(MemTable::new()),
                tables,
            }),
            storage,
            last_seq: AtomicU64::new(seq),
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Take a point-in-time view of everything written so far
    pub fn view(&self) -> View {
        let version = self.version.read();
        View {
            memtable: Arc::clone(&version.memtable),
            tables: Arc::clone(&version.tables),
            seq: self.last_seq.load(Ordering::Acquire),
        }
    }

    /// Get a value by key from the latest state
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.view().get(key)
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.write(Operation::Delete { key: key.to_vec() })
    }

    /// Apply several writes as one atomic unit
    ///
    /// The batch is a single WAL record and a single sequence number: after a
    /// crash either all of it is replayed or none, and no view observes part
    /// of it.
    pub fn write_batch(&self, mut ops: Vec<Operation>) -> Result<()> {
        if ops.len() > 1 {
            return self.write(Operation::Batch { ops });
        }
        match ops.pop() {
            Some(op) => self.write(op),
            None => Ok(()),
        }
    }

    /// Read the latest state and write based on it, with no other write in between
    ///
    /// `f` must only read through the view it is given.
    pub fn read_modify_write<R>(&self, f: impl FnOnce(&View) -> (Vec<Operation>, R)) -> Result<R> {
        let _write_guard = self.write_lock.lock();
        let (ops, result) = f(&self.view());
        if !ops.is_empty() {
            self.apply_locked(Operation::Batch { ops })?;
        }
        Ok(result)
    }

    fn write(&self, op: Operation) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.apply_locked(op)
    }

    /// Called with `write_lock` held
    fn apply_locked(&self, op: Operation) -> Result<()> {
        // Step 1: WAL first (durability guarantee)
        self.wal.lock().append(op.clone())?;

        // Step 2: MemTable, every write of the op under one sequence number
        let seq = self.last_seq.load(Ordering::Relaxed) + 1;
        let memtable = Arc::clone(&self.version.read().memtable);
        let mut writes = Vec::with_capacity(op.write_count());
        op.into_writes(&mut writes);
        for (key, value) in writes {
            match value {
                Some(v) => memtable.put(key, v, seq),
                None => memtable.delete(key, seq),
            };
        }

        // Step 3: publish
        self.last_seq.store(seq, Ordering::Release);

        // Step 4: flush if needed
        if memtable.should_flush(self.config.memtable_size_limit) {
            self.flush_locked()?;
        }
        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_locked()
    }

    /// Called with `write_lock` held
    fn flush_locked(&self) -> Result<()> {
        let memtable = Arc::clone(&self.version.read().memtable);
        if memtable.is_empty() {
            return Ok(());
        }

        // Step 1: write the SSTable
        let tables = self.storage.flush(&memtable)?;

        // Step 2: swap in a fresh memtable together with the new table list.
        // Views taken earlier keep the old pair alive.
        {
            let mut version = self.version.write();
            *version = Version {
                memtable: Arc::new(MemTable::new()),
                tables,
            };
        }

        // Step 3: truncate WAL (entries are now durable in SSTable)
        self.wal.lock().truncate()?;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(&self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        tracing::info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.version.read().memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.version.read().memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Highest applied sequence number
    pub fn last_sequence(&self) -> u64 {
        self.last_seq.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
