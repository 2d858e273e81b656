//! Lexicon
//!
//! Maps `(index_term, raw_term)` to a stable token id and carries the cached
//! posting count maintained by the stats sweep.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Value stored under a lexicon key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub token_id: u64,
    /// Posting count as of the last sweep; may lag behind writes
    pub count: u64,
}

impl LexiconEntry {
    pub fn new(token_id: u64) -> Self {
        Self { token_id, count: 0 }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// In-process `(index_term, raw_term) → token_id` cache
///
/// Cleared wholesale when full; entries are immutable once minted so a stale
/// hit is impossible.
#[derive(Debug)]
pub(crate) struct TokenCache {
    entries: HashMap<(String, String), u64>,
    capacity: usize,
}

impl TokenCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn get(&self, index_term: &str, raw_term: &str) -> Option<u64> {
        self.entries
            .get(&(index_term.to_string(), raw_term.to_string()))
            .copied()
    }

    pub(crate) fn insert(&mut self, index_term: &str, raw_term: &str, token_id: u64) {
        if self.entries.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "token cache full; clearing");
            self.entries.clear();
        }
        self.entries
            .insert((index_term.to_string(), raw_term.to_string()), token_id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
