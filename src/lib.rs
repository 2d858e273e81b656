//! # TideKV
//!
//! An embedded, transactional key-value store with:
//! - Write-Ahead Logging (WAL) for durability, one record per atomic batch
//! - Crash recovery with partial write handling
//! - Point-in-time snapshots and ordered cursors in both directions
//! - Buffered transactions with read-your-writes and commit triggers
//! - A full-text index built on top of the key space
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Full-Text Index                           │
//! │       (terms, lexicon, postings, stats worker, queries)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ ReadView / WriteView
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │            Db  ·  Snapshot  ·  Transaction                   │
//! │          (cursors, merge iterator, triggers)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │        (single writer, sequence-pinned views)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │ (versioned) │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use tidekv::{Db, FullTextIndex, Query};
//! use tidekv::fulltext::parse_terms;
//!
//! # fn main() -> tidekv::Result<()> {
//! let db = Db::open_path(std::path::Path::new("./data"))?;
//! let index = FullTextIndex::open(&db, "contacts")?;
//!
//! let mut txn = db.new_transaction();
//! txn.put(b"contact/1", b"Paris Hilton");
//! index.update_index(&mut txn, "1", "hilton", &parse_terms("Paris Hilton"));
//! txn.commit();
//!
//! let query = Query::parse("par").unwrap();
//! let ids = index.search_doc_ids(&db.new_snapshot(), &query, 10);
//! assert_eq!(ids, vec!["1"]);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod codec;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod db;
pub mod fulltext;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TideError};
pub use config::{Config, IndexConfig, WalSyncStrategy};
pub use db::{Cursor, Db, Direction, ReadView, Snapshot, Transaction, WriteView};
pub use engine::Engine;
pub use fulltext::{FullTextIndex, Query};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
