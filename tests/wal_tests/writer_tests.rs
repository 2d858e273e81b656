//! Tests for WAL Writer
//!
//! These tests verify:
//! - LSN sequencing, including across reopen and truncation
//! - Sync strategies
//! - Writer output is readable

use tidekv::config::WalSyncStrategy;
use tidekv::wal::{Operation, WalWriter};

use super::{del, put, read_all, setup_temp_wal};

#[test]
fn test_lsn_starts_at_one() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(put("a", "1")).unwrap(), 1);
    assert_eq!(writer.append(del("a")).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
        writer.append(put("b", "2")).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(put("c", "3")).unwrap(), 3);
}

#[test]
fn test_truncate_keeps_lsn_increasing() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.truncate().unwrap();

    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(put("b", "2")).unwrap(), 2);

    let entries = read_all(&wal_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 2);
}

#[test]
fn test_batch_is_one_record() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer
        .append(Operation::Batch {
            ops: (0..10).map(|i| put(&format!("k{}", i), "v")).collect(),
        })
        .unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_every_n_entries_strategy() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer =
            WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();
        for i in 0..7 {
            writer.append(put(&format!("k{}", i), "v")).unwrap();
        }
        writer.sync().unwrap();
    }

    assert_eq!(read_all(&wal_path).len(), 7);
}
