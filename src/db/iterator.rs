//! Merge Iterator
//!
//! Interleaves a transaction's pending writes with the database contents,
//! preserving global key order.
//!
//! ## Algorithm
//! At each step the next pending candidate is compared with the base cursor
//! (in iteration direction):
//! - pending first   → consume it; yield if it is a write
//! - equal keys      → consume it and advance the base past the duplicate
//! - base first      → yield the base entry
//!
//! A pending delete is never yielded but still consumes its turn.
//!
//! The pending map is read live on every step rather than copied when the
//! cursor is created, so writes buffered on the transaction while a cursor
//! is open become visible to that cursor once it reaches them.

use std::cmp::Ordering;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;

use super::transaction::PendingMap;
use super::{Cursor, Db, Direction, PendingWrite, StoreCursor};

/// Where the cursor currently stands
enum Current {
    /// Exhausted
    None,
    /// Yielding the base cursor's entry
    Base,
    /// Yielding a pending write (already consumed)
    Pending(Vec<u8>, Vec<u8>),
}

/// Cursor over `(base ∪ pending writes) − pending deletes`
pub struct TxnCursor {
    pending: Arc<Mutex<PendingMap>>,
    db: Db,
    base: StoreCursor,
    direction: Direction,
    /// Bound the next pending lookup starts from
    pending_from: Bound<Vec<u8>>,
    current: Current,
}

impl TxnCursor {
    pub(crate) fn new(pending: Arc<Mutex<PendingMap>>, db: Db, direction: Direction) -> Self {
        let base = StoreCursor::new(db.engine().view(), direction);
        Self {
            pending,
            db,
            base,
            direction,
            pending_from: Bound::Unbounded,
            current: Current::None,
        }
    }

    /// Next pending entry from `pending_from` in iteration direction
    fn next_pending(&self) -> Option<(Vec<u8>, PendingWrite)> {
        let map = self.pending.lock();
        let from = match &self.pending_from {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let found = if self.direction.is_reverse() {
            map.range::<[u8], _>((Bound::Unbounded, from)).next_back()
        } else {
            map.range::<[u8], _>((from, Bound::Unbounded)).next()
        };
        found.map(|(k, w)| (k.clone(), w.clone()))
    }

    /// Advance until positioned on a yieldable entry or exhausted
    fn settle(&mut self) {
        loop {
            let Some((key, write)) = self.next_pending() else {
                self.current = if self.base.valid() {
                    Current::Base
                } else {
                    Current::None
                };
                return;
            };

            let order = if self.base.valid() {
                let ord = key.as_slice().cmp(self.base.key());
                if self.direction.is_reverse() {
                    ord.reverse()
                } else {
                    ord
                }
            } else {
                Ordering::Less
            };

            match order {
                Ordering::Greater => {
                    self.current = Current::Base;
                    return;
                }
                Ordering::Equal => self.base.next(),
                Ordering::Less => {}
            }

            self.pending_from = Bound::Excluded(key.clone());
            if let PendingWrite::Write(value) = write {
                self.current = Current::Pending(key, value);
                return;
            }
        }
    }
}

impl Cursor for TxnCursor {
    fn valid(&self) -> bool {
        !matches!(self.current, Current::None)
    }

    fn key(&self) -> &[u8] {
        match &self.current {
            Current::None => &[],
            Current::Base => self.base.key(),
            Current::Pending(key, _) => key,
        }
    }

    fn value(&self) -> &[u8] {
        match &self.current {
            Current::None => &[],
            Current::Base => self.base.value(),
            Current::Pending(_, value) => value,
        }
    }

    fn next(&mut self) {
        match self.current {
            Current::None => return,
            Current::Base => self.base.next(),
            Current::Pending(..) => {}
        }
        self.settle();
    }

    /// Repositions both sides; the base side is re-pinned to the latest state
    fn seek(&mut self, target: &[u8]) {
        self.base.repin(self.db.engine().view());
        self.base.seek(target);
        self.pending_from = Bound::Included(target.to_vec());
        self.settle();
    }

    fn rewind(&mut self) {
        self.base.repin(self.db.engine().view());
        self.base.rewind();
        self.pending_from = Bound::Unbounded;
        self.settle();
    }

    fn direction(&self) -> Direction {
        self.direction
    }
}
