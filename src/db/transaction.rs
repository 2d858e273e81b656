//! Transaction
//!
//! A mutable overlay of buffered writes and deletes over the database.
//!
//! ## Semantics
//! - Reads consult the pending map first ("read your own writes"); a pending
//!   delete reads as not-found. Anything else falls through to the live
//!   database.
//! - `flush()` makes the buffer durable as one atomic batch without running
//!   triggers; bulk loaders use it with `mutation_count()` to bound memory.
//! - `commit()` flushes, then runs keyed triggers (ordered by key) followed
//!   by anonymous triggers (in registration order), each exactly once.
//! - `abandon()`, or dropping the transaction, discards buffered writes and
//!   triggers without touching the database.
//!
//! No isolation is provided between concurrent transactions: callers keep a
//! single writer per database.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::wal::Operation;

use super::{Cursor, Db, Direction, ReadView, Trigger, TxnCursor, WriteView};

/// A buffered mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    Write(Vec<u8>),
    Delete,
}

pub(crate) type PendingMap = BTreeMap<Vec<u8>, PendingWrite>;

/// Buffered writes over a [`Db`], applied atomically on commit
pub struct Transaction {
    db: Db,
    /// Shared with live cursors, which re-read it on every step
    pending: Arc<Mutex<PendingMap>>,
    mutations: usize,
    keyed_triggers: BTreeMap<String, Trigger>,
    anonymous_triggers: Vec<Trigger>,
}

impl Transaction {
    pub(crate) fn new(db: Db) -> Self {
        Self {
            db,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
            mutations: 0,
            keyed_triggers: BTreeMap::new(),
            anonymous_triggers: Vec::new(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(pending) = self.pending.lock().get(key) {
            return match pending {
                PendingWrite::Write(value) => Some(value.clone()),
                PendingWrite::Delete => None,
            };
        }
        self.db.get(key)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.buffer(key, PendingWrite::Write(value.to_vec()));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.buffer(key, PendingWrite::Delete);
    }

    fn buffer(&mut self, key: &[u8], write: PendingWrite) {
        self.pending.lock().insert(key.to_vec(), write);
        self.mutations += 1;
    }

    /// Mutations buffered since the last flush/commit/abandon
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Merge cursor over the pending map and the database
    pub fn iter(&self, direction: Direction) -> TxnCursor {
        let mut cursor = TxnCursor::new(
            Arc::clone(&self.pending),
            self.db.clone(),
            direction,
        );
        cursor.rewind();
        cursor
    }

    /// Register `callback` to run after commit; replaces an earlier callback
    /// registered under the same key
    pub fn add_commit_trigger(
        &mut self,
        key: impl Into<String>,
        callback: impl FnOnce() + Send + 'static,
    ) {
        self.keyed_triggers.insert(key.into(), Box::new(callback));
    }

    /// Register `callback` to run after commit, after every keyed trigger
    pub fn add_anonymous_trigger(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.anonymous_triggers.push(Box::new(callback));
    }

    /// Write all buffered entries as one atomic batch; triggers stay queued
    pub fn flush(&mut self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        self.mutations = 0;
        if pending.is_empty() {
            return;
        }

        let count = pending.len();
        let ops = pending
            .into_iter()
            .map(|(key, write)| match write {
                PendingWrite::Write(value) => Operation::Put { key, value },
                PendingWrite::Delete => Operation::Delete { key },
            })
            .collect();
        self.db.write_batch(ops);
        tracing::trace!(keys = count, "transaction batch written");
    }

    /// Flush, then run every trigger once
    pub fn commit(&mut self) {
        self.flush();

        let keyed = std::mem::take(&mut self.keyed_triggers);
        let anonymous = std::mem::take(&mut self.anonymous_triggers);
        for (_, trigger) in keyed {
            trigger();
        }
        for trigger in anonymous {
            trigger();
        }
    }

    /// Discard buffered writes and triggers
    pub fn abandon(&mut self) {
        self.pending.lock().clear();
        self.mutations = 0;
        self.keyed_triggers.clear();
        self.anonymous_triggers.clear();
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let buffered = self.pending.lock().len();
        if buffered > 0 {
            tracing::debug!(keys = buffered, "transaction dropped without commit; abandoning");
        }
        self.abandon();
    }
}

impl ReadView for Transaction {
    type Cursor = TxnCursor;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        Transaction::get(self, key)
    }

    fn iter(&self, direction: Direction) -> TxnCursor {
        Transaction::iter(self, direction)
    }
}

impl WriteView for Transaction {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        Transaction::put(self, key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        Transaction::delete(self, key)
    }

    fn after_commit(&mut self, key: &str, callback: Trigger) {
        self.keyed_triggers.insert(key.to_string(), callback);
    }
}
