//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::MemTableEntry;

/// Versions of one key, ascending by sequence number
type VersionChain = Vec<(u64, MemTableEntry)>;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
    /// Approximate size in bytes (keys + values of every version)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Put a key-value pair written at sequence `seq`; returns the new size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>, seq: u64) -> usize {
        let added = key.len() + value.len();
        self.insert(key, MemTableEntry::Value(value), seq, added)
    }

    /// Insert a tombstone written at sequence `seq`; returns the new size
    pub fn delete(&self, key: Vec<u8>, seq: u64) -> usize {
        let added = key.len();
        self.insert(key, MemTableEntry::Tombstone, seq, added)
    }

    fn insert(&self, key: Vec<u8>, entry: MemTableEntry, seq: u64, added: usize) -> usize {
        let mut data = self.data.write();
        let chain = data.entry(key).or_default();
        debug_assert!(chain.last().map_or(true, |(s, _)| *s <= seq));
        chain.push((seq, entry));
        self.size.fetch_add(added, Ordering::Relaxed) + added
    }

    /// Newest version of `key` visible at `seq`
    ///
    /// `Some(Tombstone)` means the key is known deleted; `None` means the
    /// memtable has nothing to say and older storage must be consulted.
    pub fn get(&self, key: &[u8], seq: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        data.get(key).and_then(|chain| visible(chain, seq)).cloned()
    }

    /// First key strictly after / at `from` (per `reverse`) that has a
    /// version visible at `seq`, with that version
    pub fn seek(
        &self,
        from: Bound<&[u8]>,
        reverse: bool,
        seq: u64,
    ) -> Option<(Vec<u8>, MemTableEntry)> {
        let data = self.data.read();
        let found = if reverse {
            data.range::<[u8], _>((Bound::Unbounded, from))
                .rev()
                .find_map(|(k, chain)| visible(chain, seq).map(|e| (k, e)))
        } else {
            data.range::<[u8], _>((from, Bound::Unbounded))
                .find_map(|(k, chain)| visible(chain, seq).map(|e| (k, e)))
        };
        found.map(|(k, e)| (k.clone(), e.clone()))
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of distinct keys
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Latest version of every key, in sorted key order (for flush)
    pub fn iter(&self) -> MemTableIterator {
        let data = self.data.read();
        let entries: Vec<_> = data
            .iter()
            .filter_map(|(k, chain)| chain.last().map(|(_, e)| (k.clone(), e.clone())))
            .collect();
        MemTableIterator {
            inner: entries.into_iter(),
        }
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

fn visible(chain: &VersionChain, seq: u64) -> Option<&MemTableEntry> {
    chain.iter().rev().find(|(s, _)| *s <= seq).map(|(_, e)| e)
}

/// Iterator over MemTable entries
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(Vec<u8>, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
