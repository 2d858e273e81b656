//! Tests for WAL Reader

use std::fs::{File, OpenOptions};
use std::io::Write;

use tidekv::config::WalSyncStrategy;
use tidekv::wal::{WalReader, WalWriter, HEADER_SIZE};
use tidekv::TideError;

use super::{del, put, read_all, setup_temp_wal, write_puts};

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_back_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
        writer.append(del("a")).unwrap();
    }

    let entries = read_all(&wal_path);

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(entries[0].operation, put("a", "1"));
    assert_eq!(entries[1].operation, del("a"));
}

#[test]
fn test_partial_header_is_corruption() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 2);
    let valid_len = std::fs::metadata(&wal_path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0u8; HEADER_SIZE / 2]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(TideError::WalCorruption(_))));
    assert_eq!(reader.position(), valid_len);
}

#[test]
fn test_garbage_after_valid_entry_is_an_error() {
    let (_temp, wal_path) = setup_temp_wal();
    write_puts(&wal_path, 1);
    let valid_len = std::fs::metadata(&wal_path).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xAB; 20]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().is_err());
    assert_eq!(reader.position(), valid_len);
}
