//! Full-Text Index
//!
//! A named inverted index stored entirely in the key space of a [`Db`].
//!
//! ## Data Flow
//! ```text
//!  text ──parse_terms──► IndexTerm ──token_id──► lexicon (l/, r/, m/next_id)
//!                                      │
//!  update_index(txn, doc, sort_key) ───┴──► postings i/<tid>\t<sort>\t<doc>
//!                                           d/<doc> (posting list of doc)
//!                                           ti/<tid> dirty marker
//!                                                │ after commit
//!                                                ▼
//!                                          stats worker ──► lexicon counts
//!
//!  Query ──search(view)──► ResultIterator (Token | And | Or)
//! ```
//!
//! ## Consistency
//! - Postings, document lists and dirty markers are written through the
//!   caller's [`WriteView`], so they commit atomically with the caller's
//!   own data.
//! - Token ids are minted in an independent transaction committed at once.
//!   An abandoned caller transaction can therefore leave lexicon entries
//!   without postings, which is harmless.
//! - Lexicon counts are eventually consistent; [`FullTextIndex::wait_for_stats`]
//!   blocks until pending work is swept.

mod keys;
mod lexicon;
mod query;
mod results;
mod stats;
mod terms;

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

pub use keys::{IndexKeys, FIELD_DELIMITER};
pub use lexicon::LexiconEntry;
pub use query::Query;
pub use results::{AndIterator, DocKey, OrIterator, ResultIterator, TokenIterator};
pub use terms::{parse_terms, verbatim_term, IndexTerm};

use crate::codec;
use crate::config::IndexConfig;
use crate::db::{Db, Direction, ReadView, WriteView};
use crate::error::{OrFatal, Result, TideError};

use lexicon::TokenCache;
use stats::{Kicker, StatsWorker, Sweeper};

/// One autocomplete suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Raw term when stored, otherwise the index term
    pub term: String,
    /// Cached posting count
    pub count: u64,
}

/// A named full-text index over a database
pub struct FullTextIndex {
    db: Db,
    name: String,
    keys: IndexKeys,
    cache: Mutex<TokenCache>,
    /// Serializes token minting within the process
    mint_lock: Mutex<()>,
    stamps: AtomicU64,
    kicker: Kicker,
    worker: StatsWorker,
}

impl FullTextIndex {
    /// Open the index `name` with default settings
    pub fn open(db: &Db, name: &str) -> Result<Self> {
        Self::with_config(db, name, IndexConfig::default())
    }

    /// Open the index `name`; starts its stats worker and sweeps any dirty
    /// tokens left by a previous process
    pub fn with_config(db: &Db, name: &str, config: IndexConfig) -> Result<Self> {
        if name.is_empty() || name.contains('/') {
            return Err(TideError::Config(format!("invalid index name {:?}", name)));
        }
        let keys = IndexKeys::new(name);
        let sweeper = Sweeper::new(db.clone(), keys.clone(), config.sweep_batch_size);
        let worker = StatsWorker::spawn(name, sweeper)?;
        let kicker = worker.kicker();
        kicker.kick();

        // Stamps only need to differ from any marker a previous process left
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        tracing::debug!(index = name, "full-text index opened");
        Ok(Self {
            db: db.clone(),
            name: name.to_string(),
            keys,
            cache: Mutex::new(TokenCache::new(config.lexicon_cache_capacity)),
            mint_lock: Mutex::new(()),
            stamps: AtomicU64::new(seed),
            kicker,
            worker,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &IndexKeys {
        &self.keys
    }

    // -------------------------------------------------------------------------
    // Lexicon
    // -------------------------------------------------------------------------

    /// Stable id of `(index_term, raw_term)`, minting one on first use
    ///
    /// `raw_term` is stored only when it differs from `index_term`. Minting
    /// commits immediately in its own transaction.
    pub fn token_id(&self, index_term: &str, raw_term: &str) -> u64 {
        let raw = if raw_term == index_term { "" } else { raw_term };
        if let Some(id) = self.cache.lock().get(index_term, raw) {
            return id;
        }

        let _mint = self.mint_lock.lock();
        let lexicon_key = self.keys.lexicon(index_term, raw);
        if let Some(bytes) = self.db.get(&lexicon_key) {
            match LexiconEntry::decode(&bytes) {
                Ok(entry) => {
                    self.cache.lock().insert(index_term, raw, entry.token_id);
                    return entry.token_id;
                }
                Err(err) => {
                    tracing::warn!(index_term, error = %err, "re-minting unreadable lexicon entry");
                }
            }
        }

        let mut txn = self.db.new_transaction();
        let next_key = self.keys.next_id();
        let token_id = match txn.get(&next_key) {
            Some(bytes) => codec::decode_fixed64(&mut bytes.as_slice()).or_fatal("token id counter"),
            None => 1,
        };
        let mut counter = Vec::with_capacity(8);
        codec::put_fixed64(&mut counter, token_id + 1);
        txn.put(&next_key, &counter);
        txn.put(
            &lexicon_key,
            &LexiconEntry::new(token_id).encode().or_fatal("encode lexicon entry"),
        );
        let reverse_key = self.keys.reverse(token_id);
        debug_assert!(txn.get(&reverse_key).is_none(), "token id {} minted twice", token_id);
        txn.put(&reverse_key, &lexicon_key);
        txn.commit();

        tracing::trace!(index = %self.name, index_term, token_id, "token minted");
        self.cache.lock().insert(index_term, raw, token_id);
        token_id
    }

    /// Stored lexicon entry of `(index_term, raw_term)`
    pub fn lexicon_entry<R: ReadView>(
        &self,
        view: &R,
        index_term: &str,
        raw_term: &str,
    ) -> Option<LexiconEntry> {
        let raw = if raw_term == index_term { "" } else { raw_term };
        let bytes = view.get(&self.keys.lexicon(index_term, raw))?;
        LexiconEntry::decode(&bytes).ok()
    }

    /// Postings of `token_id` visible in `view`, counted directly
    pub fn posting_count<R: ReadView>(&self, view: &R, token_id: u64) -> u64 {
        stats::count_postings(view, &self.keys, token_id)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Replace every posting of `doc_id` with postings for `terms`
    ///
    /// `sort_key` must not contain a tab; release builds replace tabs with
    /// spaces and log.
    pub fn update_index<W: WriteView>(
        &self,
        txn: &mut W,
        doc_id: &str,
        sort_key: &str,
        terms: &[IndexTerm],
    ) {
        debug_assert!(
            !sort_key.contains(FIELD_DELIMITER),
            "sort key of {} contains a tab",
            doc_id
        );
        let sort_key = if sort_key.contains(FIELD_DELIMITER) {
            tracing::warn!(doc_id, "tab in sort key replaced with space");
            sort_key.replace(FIELD_DELIMITER, " ")
        } else {
            sort_key.to_string()
        };

        let mut dirty = self.delete_postings(txn, doc_id);

        let mut postings = BTreeSet::new();
        for term in terms {
            let token_id = self.token_id(&term.index_term, &term.raw_term);
            postings.insert(self.keys.posting(token_id, &sort_key, doc_id));
            dirty.insert(token_id);
        }
        for key in &postings {
            txn.put(key, &[]);
        }

        let doc_key = self.keys.document(doc_id);
        if postings.is_empty() {
            txn.delete(&doc_key);
        } else {
            let list: Vec<Vec<u8>> = postings.into_iter().collect();
            let encoded = bincode::serialize(&list)
                .map_err(TideError::from)
                .or_fatal("encode posting list");
            txn.put(&doc_key, &encoded);
        }

        self.mark_dirty(txn, &dirty);
    }

    /// Delete every posting of `doc_id`
    pub fn remove_terms<W: WriteView>(&self, txn: &mut W, doc_id: &str) {
        let dirty = self.delete_postings(txn, doc_id);
        txn.delete(&self.keys.document(doc_id));
        self.mark_dirty(txn, &dirty);
    }

    /// Delete the recorded postings of `doc_id`; returns their token ids
    fn delete_postings<W: WriteView>(&self, txn: &mut W, doc_id: &str) -> BTreeSet<u64> {
        let mut tokens = BTreeSet::new();
        let Some(bytes) = txn.get(&self.keys.document(doc_id)) else {
            return tokens;
        };
        let list: Vec<Vec<u8>> = match bincode::deserialize(&bytes) {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(doc_id, error = %err, "ignoring unreadable posting list");
                return tokens;
            }
        };
        for key in list {
            match self.keys.posting_token(&key) {
                Some(token_id) => {
                    tokens.insert(token_id);
                }
                None => tracing::warn!(doc_id, key = ?key, "unrecognized posting key"),
            }
            txn.delete(&key);
        }
        tokens
    }

    fn mark_dirty<W: WriteView>(&self, txn: &mut W, tokens: &BTreeSet<u64>) {
        if tokens.is_empty() {
            return;
        }
        let stamp = stats::encode_stamp(self.stamps.fetch_add(1, Ordering::Relaxed));
        for &token_id in tokens {
            txn.put(&self.keys.dirty(token_id), &stamp);
        }
        let kicker = self.kicker.clone();
        txn.after_commit(
            &format!("fulltext-stats/{}", self.name),
            Box::new(move || kicker.kick()),
        );
    }

    /// Block until lexicon counts reflect every commit made before this call
    pub fn wait_for_stats(&self) {
        self.worker.drain();
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Matching documents in `(sort_key, doc_id)` order
    ///
    /// Terms are matched as given; use [`Query::parse`] for normalized input.
    pub fn search<R: ReadView>(&self, view: &R, query: &Query) -> ResultIterator<R::Cursor> {
        match query {
            Query::Term(term) => self.lexicon_union(view, &self.keys.lexicon_term_prefix(term)),
            Query::Prefix(prefix) => self.lexicon_union(view, &self.keys.lexicon_prefix(prefix)),
            Query::And(children) => {
                let mut iters = Vec::with_capacity(children.len());
                for child in children {
                    let it = self.search(view, child);
                    if !it.valid() {
                        return ResultIterator::Empty;
                    }
                    iters.push(it);
                }
                match iters.len() {
                    0 => ResultIterator::Empty,
                    1 => iters.remove(0),
                    _ => ResultIterator::And(AndIterator::new(iters)),
                }
            }
            Query::Or(children) => {
                let iters: Vec<_> = children
                    .iter()
                    .map(|child| self.search(view, child))
                    .filter(ResultIterator::valid)
                    .collect();
                union(iters)
            }
        }
    }

    /// Up to `limit` document ids matching `query`
    pub fn search_doc_ids<R: ReadView>(&self, view: &R, query: &Query, limit: usize) -> Vec<String> {
        let mut results = self.search(view, query);
        let mut out = Vec::new();
        while results.valid() && out.len() < limit {
            out.push(results.doc_id().to_string());
            results.next();
        }
        out
    }

    /// Terms starting with `prefix`, most frequent first
    ///
    /// Entries sharing a display term keep the highest count. Counts lag the
    /// statistics sweep, so a zero count may be a freshly indexed term; those
    /// are kept and rank last.
    pub fn suggestions<R: ReadView>(&self, view: &R, prefix: &str, limit: usize) -> Vec<Suggestion> {
        let mut best: HashMap<String, u64> = HashMap::new();
        for (key, value) in view.scan_prefix(&self.keys.lexicon_prefix(prefix)) {
            let Some((index_term, raw_term)) = self.keys.parse_lexicon(&key) else {
                continue;
            };
            let Ok(entry) = LexiconEntry::decode(&value) else {
                tracing::warn!(index_term, "skipping unreadable lexicon entry");
                continue;
            };
            let term = if raw_term.is_empty() { index_term } else { raw_term };
            let slot = best.entry(term.to_string()).or_insert(0);
            *slot = (*slot).max(entry.count);
        }

        let mut out: Vec<Suggestion> = best
            .into_iter()
            .map(|(term, count)| Suggestion { term, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        out.truncate(limit);
        out
    }

    /// One token iterator per lexicon entry under `prefix`, unioned
    fn lexicon_union<R: ReadView>(&self, view: &R, prefix: &[u8]) -> ResultIterator<R::Cursor> {
        let mut iters = Vec::new();
        for (key, value) in view.scan_prefix(prefix) {
            let Some((index_term, raw_term)) = self.keys.parse_lexicon(&key) else {
                continue;
            };
            let entry = match LexiconEntry::decode(&value) {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(index_term, error = %err, "skipping unreadable lexicon entry");
                    continue;
                }
            };
            let display = if raw_term.is_empty() { index_term } else { raw_term };
            let it = ResultIterator::Token(TokenIterator::new(
                view.iter(Direction::Forward),
                self.keys.posting_prefix(entry.token_id),
                display.to_string(),
            ));
            if it.valid() {
                iters.push(it);
            }
        }
        union(iters)
    }
}

fn union<C: crate::db::Cursor>(mut iters: Vec<ResultIterator<C>>) -> ResultIterator<C> {
    match iters.len() {
        0 => ResultIterator::Empty,
        1 => iters.remove(0),
        _ => ResultIterator::Or(OrIterator::new(iters)),
    }
}
