//! Snapshot
//!
//! An immutable, point-in-time read view of the database.
//!
//! # Isolation Guarantees
//!
//! A snapshot ALWAYS shows every write applied before it was taken, and
//! NEVER shows writes applied after, whichever handle made them and however
//! long afterwards it is read. It pins the memtable and SSTables that were
//! current at creation; dropping the last snapshot sharing them releases
//! them. Snapshots never block writers or each other.
//!
//! There is no write surface: a snapshot implements [`ReadView`] only.

use crate::engine::View;
use crate::error::OrFatal;

use super::{Cursor, Direction, ReadView, StoreCursor};

/// Read-only view bound to its creation instant
#[derive(Clone)]
pub struct Snapshot {
    view: View,
}

impl Snapshot {
    pub(crate) fn new(view: View) -> Self {
        Self { view }
    }

    /// Another snapshot of the same instant
    pub fn new_snapshot(&self) -> Snapshot {
        self.clone()
    }

    /// Engine sequence number this snapshot was taken at
    pub fn sequence(&self) -> u64 {
        self.view.sequence()
    }
}

impl ReadView for Snapshot {
    type Cursor = StoreCursor;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.view.get(key).or_fatal("snapshot get")
    }

    fn iter(&self, direction: Direction) -> StoreCursor {
        let mut cursor = StoreCursor::new(self.view.clone(), direction);
        cursor.rewind();
        cursor
    }
}
