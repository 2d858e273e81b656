//! WAL test suite
//!
//! Shared helpers live here; each file covers one component.

mod reader_tests;
mod recovery_tests;
mod writer_tests;

use std::path::PathBuf;

use tempfile::TempDir;
use tidekv::config::WalSyncStrategy;
use tidekv::wal::{Operation, WalEntry, WalReader, WalWriter};

pub fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

pub fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

pub fn del(key: &str) -> Operation {
    Operation::Delete {
        key: key.as_bytes().to_vec(),
    }
}

/// Every valid entry of a well-formed WAL, in order
pub fn read_all(path: &PathBuf) -> Vec<WalEntry> {
    let mut reader = WalReader::open(path).unwrap();
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        entries.push(entry);
    }
    entries
}

/// Append `count` puts through a writer (a well-formed WAL)
pub fn write_puts(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(put(&format!("key{}", i), &format!("value{}", i)))
            .unwrap();
    }
}
