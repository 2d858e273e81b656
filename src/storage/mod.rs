//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Efficient point lookups and ordered seeks
//! - Immutable table lists shared with snapshots
//!
//! See [`sstable`] for the file format.

pub mod sstable;
mod manager;

pub use manager::{lookup, seek, StorageManager, TableList};
pub use sstable::{SSTable, SSTableBuilder, SSTableReader};
