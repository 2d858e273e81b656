//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and cursors
//! - Keep every version written since the last flush, tagged with its
//!   sequence number, so snapshots taken earlier still read their view
//!
//! ## Data Structure Choice
//! BTreeMap of key → version chain, wrapped in RwLock:
//! - Ordered keys (required for SSTable generation and range scans)
//! - Version chains are short: they only live until the next flush

mod table;

pub use table::{MemTable, MemTableIterator};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// Value bytes, or `None` for a tombstone
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            MemTableEntry::Value(v) => Some(v),
            MemTableEntry::Tombstone => None,
        }
    }
}
