//! MemTable Tests
//!
//! Tests verify:
//! - Versioned reads at a sequence number
//! - Tombstone handling
//! - Ordered seeks in both directions
//! - Size tracking and flush iteration
//! - Concurrent readers alongside a writer

use std::ops::Bound;
use std::sync::Arc;
use std::thread;

use tidekv::memtable::{MemTable, MemTableEntry};

fn value(v: &str) -> Option<MemTableEntry> {
    Some(MemTableEntry::Value(v.as_bytes().to_vec()))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert!(memtable.is_empty());
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
}

#[test]
fn test_put_and_get() {
    let memtable = MemTable::new();
    memtable.put(b"key1".to_vec(), b"value1".to_vec(), 1);

    assert_eq!(memtable.get(b"key1", 1), value("value1"));
    assert_eq!(memtable.get(b"missing", 1), None);
}

#[test]
fn test_tombstone_is_reported() {
    let memtable = MemTable::new();
    memtable.put(b"k".to_vec(), b"v".to_vec(), 1);
    memtable.delete(b"k".to_vec(), 2);

    assert_eq!(memtable.get(b"k", 2), Some(MemTableEntry::Tombstone));
    assert_eq!(MemTableEntry::Tombstone.value(), None);
}

// =============================================================================
// Versioning Tests
// =============================================================================

#[test]
fn test_reads_see_version_at_sequence() {
    let memtable = MemTable::new();
    memtable.put(b"k".to_vec(), b"v1".to_vec(), 1);
    memtable.put(b"k".to_vec(), b"v2".to_vec(), 5);
    memtable.delete(b"k".to_vec(), 9);

    assert_eq!(memtable.get(b"k", 0), None);
    assert_eq!(memtable.get(b"k", 1), value("v1"));
    assert_eq!(memtable.get(b"k", 4), value("v1"));
    assert_eq!(memtable.get(b"k", 5), value("v2"));
    assert_eq!(memtable.get(b"k", 9), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_seek_skips_keys_newer_than_sequence() {
    let memtable = MemTable::new();
    memtable.put(b"a".to_vec(), b"1".to_vec(), 1);
    memtable.put(b"b".to_vec(), b"2".to_vec(), 3);
    memtable.put(b"c".to_vec(), b"3".to_vec(), 2);

    let found = memtable.seek(Bound::Excluded(&b"a"[..]), false, 2);
    assert_eq!(found, Some((b"c".to_vec(), MemTableEntry::Value(b"3".to_vec()))));
}

#[test]
fn test_seek_reverse() {
    let memtable = MemTable::new();
    for (i, key) in ["a", "b", "c"].iter().enumerate() {
        memtable.put(key.as_bytes().to_vec(), b"v".to_vec(), i as u64 + 1);
    }

    let last = memtable.seek(Bound::Unbounded, true, 10).map(|(k, _)| k);
    assert_eq!(last, Some(b"c".to_vec()));

    let before_c = memtable
        .seek(Bound::Excluded(&b"c"[..]), true, 10)
        .map(|(k, _)| k);
    assert_eq!(before_c, Some(b"b".to_vec()));

    let at_b = memtable.seek(Bound::Included(&b"b"[..]), true, 10).map(|(k, _)| k);
    assert_eq!(at_b, Some(b"b".to_vec()));
}

// =============================================================================
// Size And Flush Iteration Tests
// =============================================================================

#[test]
fn test_size_counts_every_version() {
    let memtable = MemTable::new();
    memtable.put(b"key".to_vec(), b"value".to_vec(), 1);
    assert_eq!(memtable.size(), 8);
    memtable.put(b"key".to_vec(), b"value".to_vec(), 2);
    assert_eq!(memtable.size(), 16);
    assert_eq!(memtable.delete(b"key".to_vec(), 3), 19);

    assert!(memtable.should_flush(19));
    assert!(!memtable.should_flush(20));
}

#[test]
fn test_iter_yields_latest_versions_sorted() {
    let memtable = MemTable::new();
    memtable.put(b"b".to_vec(), b"old".to_vec(), 1);
    memtable.put(b"a".to_vec(), b"x".to_vec(), 2);
    memtable.put(b"b".to_vec(), b"new".to_vec(), 3);
    memtable.delete(b"c".to_vec(), 4);

    let entries: Vec<_> = memtable.iter().collect();
    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), MemTableEntry::Value(b"x".to_vec())),
            (b"b".to_vec(), MemTableEntry::Value(b"new".to_vec())),
            (b"c".to_vec(), MemTableEntry::Tombstone),
        ]
    );
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_readers_at_fixed_sequence_are_stable() {
    let memtable = Arc::new(MemTable::new());
    memtable.put(b"k".to_vec(), b"base".to_vec(), 1);

    let writer = {
        let memtable = Arc::clone(&memtable);
        thread::spawn(move || {
            for seq in 2..500u64 {
                memtable.put(b"k".to_vec(), seq.to_string().into_bytes(), seq);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for _ in 0..500 {
                    assert_eq!(memtable.get(b"k", 1), value("base"));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(memtable.get(b"k", u64::MAX), value("499"));
}
