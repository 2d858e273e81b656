//! Database Module
//!
//! The handle collaborators use: point reads and writes, ordered cursors,
//! snapshots and transactions over the [`Engine`].
//!
//! ## Read/Write Surfaces
//! ```text
//!              ReadView ──────────── WriteView
//!                 │                      │
//!      ┌──────────┼──────────┐     ┌─────┴──────┐
//!      │          │          │     │            │
//!     Db      Snapshot  Transaction Db     Transaction
//! ```
//!
//! Local storage failures are not recoverable at this layer: an engine error
//! on any `Db`, `Snapshot` or `Transaction` operation is logged and aborts
//! the process, so callers never observe a half-written database.

mod cursor;
mod iterator;
mod snapshot;
mod transaction;

use std::path::Path;
use std::sync::Arc;

pub use cursor::StoreCursor;
pub use iterator::TxnCursor;
pub use snapshot::Snapshot;
pub use transaction::{PendingWrite, Transaction};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{OrFatal, Result};
use crate::wal::Operation;

/// Callback run once after a commit's writes are durable
pub type Trigger = Box<dyn FnOnce() + Send + 'static>;

/// Iteration direction of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order
    Forward,
    /// Descending key order
    Reverse,
}

impl Direction {
    pub fn is_reverse(self) -> bool {
        self == Direction::Reverse
    }
}

/// An ordered cursor over key/value pairs
///
/// `key()`/`value()` return empty slices when the cursor is not valid, and
/// `next()` past the end is a no-op.
pub trait Cursor {
    fn valid(&self) -> bool;
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
    fn next(&mut self);

    /// Forward: first key `>= target`. Reverse: last key `<= target`.
    fn seek(&mut self, target: &[u8]);

    /// Position at the first key in iteration order
    fn rewind(&mut self);

    fn direction(&self) -> Direction;
}

/// Read access shared by the database, snapshots and transactions
pub trait ReadView {
    type Cursor: Cursor;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// A cursor positioned at the first key in iteration order
    fn iter(&self, direction: Direction) -> Self::Cursor;

    /// Every live pair whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut cursor = self.iter(Direction::Forward);
        cursor.seek(prefix);
        let mut out = Vec::new();
        while cursor.valid() && cursor.key().starts_with(prefix) {
            out.push((cursor.key().to_vec(), cursor.value().to_vec()));
            cursor.next();
        }
        out
    }
}

/// Write access: the database itself (immediately durable) or a transaction
pub trait WriteView: ReadView {
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);

    /// Run `callback` once the writes made so far are durable. Keyed: a later
    /// registration under the same key replaces an earlier one.
    fn after_commit(&mut self, key: &str, callback: Trigger);
}

/// Handle to an open database
///
/// Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct Db {
    engine: Arc<Engine>,
}

impl Db {
    /// Open or create a database
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(Engine::open(config)?),
        })
    }

    /// Open with default settings at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.engine.get(key).or_fatal("get")
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Visible to later reads as soon as this returns; durable too under the
    /// default `WalSyncStrategy::EveryWrite`
    pub fn put(&self, key: &[u8], value: &[u8]) {
        self.engine.put(key, value).or_fatal("put")
    }

    pub fn delete(&self, key: &[u8]) {
        self.engine.delete(key).or_fatal("delete")
    }

    /// A cursor over the state as of this call
    pub fn iter(&self, direction: Direction) -> StoreCursor {
        let mut cursor = StoreCursor::new(self.engine.view(), direction);
        cursor.rewind();
        cursor
    }

    pub fn new_snapshot(&self) -> Snapshot {
        Snapshot::new(self.engine.view())
    }

    pub fn new_transaction(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    /// Force the memtable out to an SSTable
    pub fn flush(&self) {
        self.engine.flush().or_fatal("flush")
    }

    /// Flush and sync; other clones stay usable
    pub fn close(&self) {
        self.engine.close().or_fatal("close")
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn write_batch(&self, ops: Vec<Operation>) {
        self.engine.write_batch(ops).or_fatal("batch write")
    }

    pub(crate) fn read_modify_write<R>(
        &self,
        f: impl FnOnce(&Snapshot) -> (Vec<Operation>, R),
    ) -> R {
        self.engine
            .read_modify_write(|view| f(&Snapshot::new(view.clone())))
            .or_fatal("read-modify-write")
    }
}

impl ReadView for Db {
    type Cursor = StoreCursor;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        Db::get(self, key)
    }

    fn iter(&self, direction: Direction) -> StoreCursor {
        Db::iter(self, direction)
    }
}

impl WriteView for Db {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        Db::put(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        Db::delete(self, key)
    }

    /// Writes on the database are already durable, so the callback runs now
    fn after_commit(&mut self, _key: &str, callback: Trigger) {
        callback()
    }
}
