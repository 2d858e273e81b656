//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/put/delete operations
//! - Atomic batches and read-modify-write
//! - Point-in-time views across writes and flushes
//! - Flush to SSTable
//! - Crash recovery from WAL
//! - Concurrent access patterns

use std::ops::Bound;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use tidekv::config::{Config, WalSyncStrategy};
use tidekv::engine::Engine;
use tidekv::wal::Operation;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &TempDir, memtable_limit: usize) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .memtable_size_limit(memtable_limit)
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(&temp_dir, 1024 * 1024)).unwrap();
    (temp_dir, engine)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _engine = Engine::open(Config::builder().data_dir(&data_dir).build()).unwrap();

    assert!(data_dir.join("sstables").exists());
    assert!(data_dir.join("wal.log").exists());
}

#[test]
fn test_engine_put_get_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"hello", b"world").unwrap();
    assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));

    engine.put(b"hello", b"again").unwrap();
    assert_eq!(engine.get(b"hello").unwrap(), Some(b"again".to_vec()));

    engine.delete(b"hello").unwrap();
    assert_eq!(engine.get(b"hello").unwrap(), None);

    engine.delete(b"never-written").unwrap();
    assert_eq!(engine.get(b"never-written").unwrap(), None);
}

#[test]
fn test_engine_empty_and_binary_data() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"", b"empty key").unwrap();
    engine.put(b"empty value", b"").unwrap();
    engine.put(&[0, 255, 9], &[1, 2, 3]).unwrap();

    assert_eq!(engine.get(b"").unwrap(), Some(b"empty key".to_vec()));
    assert_eq!(engine.get(b"empty value").unwrap(), Some(Vec::new()));
    assert_eq!(engine.get(&[0, 255, 9]).unwrap(), Some(vec![1, 2, 3]));
}

// =============================================================================
// Batch And Sequence Tests
// =============================================================================

#[test]
fn test_batch_uses_one_sequence_number() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"before", b"x").unwrap();
    let before = engine.last_sequence();

    engine
        .write_batch(vec![put("a", "1"), put("b", "2"), put("c", "3")])
        .unwrap();

    assert_eq!(engine.last_sequence(), before + 1);
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_empty_batch_is_noop() {
    let (_temp, engine) = setup_temp_engine();
    engine.write_batch(Vec::new()).unwrap();
    assert_eq!(engine.last_sequence(), 0);
}

#[test]
fn test_view_never_sees_part_of_a_batch() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..200 {
                let v = i.to_string();
                engine.write_batch(vec![put("x", &v), put("y", &v)]).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let view = engine.view();
        assert_eq!(view.get(b"x").unwrap(), view.get(b"y").unwrap());
    }
    writer.join().unwrap();
}

#[test]
fn test_read_modify_write() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"counter", b"1").unwrap();

    let old = engine
        .read_modify_write(|view| {
            let old = view.get(b"counter").unwrap().unwrap();
            let next: u32 = String::from_utf8(old.clone()).unwrap().parse::<u32>().unwrap() + 1;
            (vec![put("counter", &next.to_string())], old)
        })
        .unwrap();

    assert_eq!(old, b"1".to_vec());
    assert_eq!(engine.get(b"counter").unwrap(), Some(b"2".to_vec()));

    let seq = engine.last_sequence();
    engine.read_modify_write(|_| (Vec::new(), ())).unwrap();
    assert_eq!(engine.last_sequence(), seq);
}

// =============================================================================
// View Tests
// =============================================================================

#[test]
fn test_view_is_point_in_time() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"k", b"old").unwrap();
    let view = engine.view();

    engine.put(b"k", b"new").unwrap();
    engine.put(b"other", b"x").unwrap();

    assert_eq!(view.get(b"k").unwrap(), Some(b"old".to_vec()));
    assert_eq!(view.get(b"other").unwrap(), None);
    assert_eq!(engine.get(b"k").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn test_view_survives_flush() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"a", b"1").unwrap();
    engine.put(b"b", b"2").unwrap();
    let view = engine.view();

    engine.delete(b"a").unwrap();
    engine.flush().unwrap();
    engine.put(b"c", b"3").unwrap();

    assert_eq!(view.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(view.get(b"c").unwrap(), None);
    assert_eq!(engine.get(b"a").unwrap(), None);
}

#[test]
fn test_view_seek_merges_memtable_and_tables() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"a", b"disk").unwrap();
    engine.put(b"c", b"disk").unwrap();
    engine.put(b"d", b"disk").unwrap();
    engine.flush().unwrap();
    engine.put(b"b", b"mem").unwrap();
    engine.put(b"c", b"mem").unwrap();
    engine.delete(b"d").unwrap();

    let view = engine.view();
    let mut seen = Vec::new();
    let mut next = view.seek(Bound::Unbounded, false).unwrap();
    while let Some((key, value)) = next {
        next = view.seek(Bound::Excluded(key.as_slice()), false).unwrap();
        seen.push((key, value));
    }

    assert_eq!(
        seen,
        vec![
            (b"a".to_vec(), b"disk".to_vec()),
            (b"b".to_vec(), b"mem".to_vec()),
            (b"c".to_vec(), b"mem".to_vec()),
        ]
    );

    let last = view.seek(Bound::Unbounded, true).unwrap().map(|(k, _)| k);
    assert_eq!(last, Some(b"c".to_vec()));
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_manual_flush() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"key", b"value").unwrap();
    assert_eq!(engine.sstable_count(), 0);

    engine.flush().unwrap();

    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));

    // Empty memtable: nothing to write
    engine.flush().unwrap();
    assert_eq!(engine.sstable_count(), 1);
}

#[test]
fn test_auto_flush_on_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(&temp_dir, 100)).unwrap();

    for i in 0..20 {
        engine
            .put(format!("key{:02}", i).as_bytes(), &[b'v'; 20])
            .unwrap();
    }

    assert!(engine.sstable_count() > 0);
    for i in 0..20 {
        assert!(engine.get(format!("key{:02}", i).as_bytes()).unwrap().is_some());
    }
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recovery_from_wal() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(&temp_dir, 1024 * 1024)).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.write_batch(vec![put("b", "2"), put("c", "3")]).unwrap();
        engine.delete(b"a").unwrap();
        // Dropped without close: only the WAL holds these writes
        assert_eq!(engine.sstable_count(), 0);
    }

    let engine = Engine::open(config(&temp_dir, 1024 * 1024)).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), None);
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"c").unwrap(), Some(b"3".to_vec()));
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(
        std::fs::metadata(temp_dir.path().join("wal.log")).unwrap().len(),
        0
    );
}

#[test]
fn test_recovery_after_interrupted_flush() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(&temp_dir, 1024 * 1024)).unwrap();
        engine.put(b"a", b"1").unwrap();
    }
    // Crash while the next table was being written
    std::fs::write(
        temp_dir.path().join("sstables").join("sstable_000001.sst.tmp"),
        b"TDKV\x01\x00",
    )
    .unwrap();

    let engine = Engine::open(config(&temp_dir, 1024 * 1024)).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.sstable_count(), 1);
    assert!(!temp_dir
        .path()
        .join("sstables")
        .join("sstable_000001.sst.tmp")
        .exists());
}

#[test]
fn test_close_then_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(&temp_dir, 1024 * 1024)).unwrap();
        for i in 0..50 {
            engine.put(format!("k{}", i).as_bytes(), b"v").unwrap();
        }
        engine.close().unwrap();
    }

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    for i in 0..50 {
        assert_eq!(engine.get(format!("k{}", i).as_bytes()).unwrap(), Some(b"v".to_vec()));
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(config(&temp_dir, 4096)).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..100 {
                    engine
                        .put(format!("t{}-{}", t, i).as_bytes(), b"value")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.last_sequence(), 400);
    for t in 0..4 {
        for i in 0..100 {
            assert!(engine.get(format!("t{}-{}", t, i).as_bytes()).unwrap().is_some());
        }
    }
}
