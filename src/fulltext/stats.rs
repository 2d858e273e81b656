//! Token Statistics
//!
//! Every posting mutation marks its token dirty (`ti/<tid>` → stamp). A
//! background worker sweeps dirty tokens: it counts postings on a snapshot,
//! then in one read-modify-write stores the count on the lexicon entry and
//! drops the marker, but only if the stamp is unchanged. A token re-marked
//! mid-sweep keeps its marker and is picked up by the next pass.
//!
//! ## Worker
//! ```text
//!  commit trigger ──Kick──┐
//!  wait_for_stats ─Drain──┼──► channel ──► worker thread ──► sweep until clean
//!  drop ────────Shutdown──┘
//! ```
//! Kicks queued while a sweep runs are coalesced into one follow-up pass.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::codec;
use crate::db::{Cursor, Db, Direction, ReadView};
use crate::error::{OrFatal, Result};
use crate::wal::Operation;

use super::keys::IndexKeys;
use super::lexicon::LexiconEntry;

enum Message {
    Kick,
    Drain(Sender<()>),
    Shutdown,
}

/// Marker value written by the index
pub(crate) fn encode_stamp(stamp: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    codec::put_fixed64(&mut out, stamp);
    out
}

/// Number of postings of `token_id` visible in `view`
pub(crate) fn count_postings<R: ReadView>(view: &R, keys: &IndexKeys, token_id: u64) -> u64 {
    let prefix = keys.posting_prefix(token_id);
    let mut cursor = view.iter(Direction::Forward);
    cursor.seek(&prefix);
    let mut count = 0;
    while cursor.valid() && cursor.key().starts_with(&prefix) {
        count += 1;
        cursor.next();
    }
    count
}

/// One index's sweep logic, owned by the worker thread
pub(crate) struct Sweeper {
    db: Db,
    keys: IndexKeys,
    batch_size: usize,
}

impl Sweeper {
    pub(crate) fn new(db: Db, keys: IndexKeys, batch_size: usize) -> Self {
        Self {
            db,
            keys,
            batch_size: batch_size.max(1),
        }
    }

    /// Sweep until no dirty marker remains; returns tokens refreshed
    pub(crate) fn sweep(&self) -> usize {
        let mut refreshed = 0;
        loop {
            let snapshot = self.db.new_snapshot();
            let prefix = self.keys.dirty_prefix();
            let mut cursor = snapshot.iter(Direction::Forward);
            cursor.seek(&prefix);

            let mut dirty = Vec::new();
            while cursor.valid() && cursor.key().starts_with(&prefix) && dirty.len() < self.batch_size
            {
                dirty.push((cursor.key().to_vec(), cursor.value().to_vec()));
                cursor.next();
            }
            if dirty.is_empty() {
                return refreshed;
            }

            for (marker, stamp) in dirty {
                if self.refresh(&snapshot, marker, stamp) {
                    refreshed += 1;
                }
            }
        }
    }

    /// Refresh one token; false if its marker moved on since `snapshot`
    fn refresh<R: ReadView>(&self, snapshot: &R, marker: Vec<u8>, stamp: Vec<u8>) -> bool {
        let Some(token_id) = self.keys.parse_dirty(&marker) else {
            tracing::warn!(key = ?marker, "dropping malformed dirty marker");
            self.db.delete(&marker);
            return false;
        };
        let count = count_postings(snapshot, &self.keys, token_id);

        self.db.read_modify_write(|view| {
            if view.get(&marker).as_deref() != Some(stamp.as_slice()) {
                return (Vec::new(), false);
            }
            let mut ops = vec![Operation::Delete {
                key: marker.clone(),
            }];

            let Some(lexicon_key) = view.get(&self.keys.reverse(token_id)) else {
                tracing::warn!(token_id, "dirty token has no lexicon entry");
                return (ops, false);
            };
            let entry = match view.get(&lexicon_key).map(|bytes| LexiconEntry::decode(&bytes)) {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    tracing::warn!(token_id, error = %err, "rewriting unreadable lexicon entry");
                    LexiconEntry::new(token_id)
                }
                None => {
                    tracing::warn!(token_id, "lexicon entry missing for reverse mapping");
                    return (ops, false);
                }
            };

            if entry.count != count || entry.token_id != token_id {
                let updated = LexiconEntry { token_id, count };
                ops.push(Operation::Put {
                    key: lexicon_key,
                    value: updated.encode().or_fatal("encode lexicon entry"),
                });
            }
            (ops, true)
        })
    }
}

/// Handle that asks the worker for a sweep; outlives the index harmlessly
#[derive(Clone)]
pub(crate) struct Kicker {
    tx: Sender<Message>,
}

impl Kicker {
    pub(crate) fn kick(&self) {
        // Fails only once the worker has shut down
        let _ = self.tx.send(Message::Kick);
    }
}

/// Dedicated sweep thread of one index
pub(crate) struct StatsWorker {
    tx: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl StatsWorker {
    pub(crate) fn spawn(name: &str, sweeper: Sweeper) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name(format!("tidekv-stats-{}", name))
            .spawn(move || run(rx, sweeper))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub(crate) fn kicker(&self) -> Kicker {
        Kicker {
            tx: self.tx.clone(),
        }
    }

    /// Block until a sweep that started after this call has finished
    pub(crate) fn drain(&self) {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.tx.send(Message::Drain(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl Drop for StatsWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("stats worker panicked");
            }
        }
    }
}

fn run(rx: Receiver<Message>, sweeper: Sweeper) {
    while let Ok(first) = rx.recv() {
        let mut waiters = Vec::new();
        let mut shutdown = false;
        for message in std::iter::once(first).chain(rx.try_iter()) {
            match message {
                Message::Kick => {}
                Message::Drain(ack) => waiters.push(ack),
                Message::Shutdown => shutdown = true,
            }
        }

        if !shutdown {
            let refreshed = sweeper.sweep();
            if refreshed > 0 {
                tracing::debug!(tokens = refreshed, "token stats refreshed");
            }
        }
        for ack in waiters {
            let _ = ack.send(());
        }
        if shutdown {
            break;
        }
    }
    tracing::trace!("stats worker stopped");
}
