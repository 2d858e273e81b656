//! Key layout of one full-text index
//!
//! ```text
//! P = "ft/<name>/"
//! P i/<tid>\t<sort_key>\t<doc_id>   posting (value unused)
//! P l/<index_term>\t<raw_term>      lexicon → LexiconEntry
//! P r/<tid>                         reverse lexicon → lexicon key
//! P ti/<tid>                        dirty-token marker → stamp
//! P m/next_id                       token id counter (fixed64)
//! P d/<doc_id>                      posting keys recorded for a document
//! ```
//!
//! `<tid>` is the order-preserving varint of the token id, so postings of one
//! token are contiguous and tokens sort numerically.

use crate::codec;

/// Separates fields inside posting and lexicon keys
pub const FIELD_DELIMITER: char = '\t';
const DELIM: u8 = b'\t';

/// Builds and parses the keys of one named index
#[derive(Debug, Clone)]
pub struct IndexKeys {
    prefix: Vec<u8>,
}

impl IndexKeys {
    pub fn new(name: &str) -> Self {
        Self {
            prefix: format!("ft/{}/", name).into_bytes(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn with(&self, section: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + section.len() + 32);
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(section);
        key
    }

    // -------------------------------------------------------------------------
    // Postings
    // -------------------------------------------------------------------------

    /// Prefix shared by every posting of `token_id`
    pub fn posting_prefix(&self, token_id: u64) -> Vec<u8> {
        let mut key = self.with(b"i/");
        codec::put_ordered_u64(&mut key, token_id);
        key.push(DELIM);
        key
    }

    pub fn posting(&self, token_id: u64, sort_key: &str, doc_id: &str) -> Vec<u8> {
        let mut key = self.posting_prefix(token_id);
        key.extend_from_slice(sort_key.as_bytes());
        key.push(DELIM);
        key.extend_from_slice(doc_id.as_bytes());
        key
    }

    /// Token id of a posting key
    ///
    /// Also accepts the legacy layout that spelled the id in decimal
    /// (`i/123\t...`); returns `None` for anything else.
    pub fn posting_token(&self, key: &[u8]) -> Option<u64> {
        let rest = key.strip_prefix(self.prefix.as_slice())?.strip_prefix(b"i/")?;
        let mut input = rest;
        if let Ok(token_id) = codec::decode_ordered_u64(&mut input) {
            if input.first() == Some(&DELIM) {
                return Some(token_id);
            }
        }
        let end = rest.iter().position(|&b| b == DELIM)?;
        std::str::from_utf8(&rest[..end]).ok()?.parse().ok()
    }

    // -------------------------------------------------------------------------
    // Lexicon
    // -------------------------------------------------------------------------

    pub fn lexicon(&self, index_term: &str, raw_term: &str) -> Vec<u8> {
        let mut key = self.lexicon_term_prefix(index_term);
        key.extend_from_slice(raw_term.as_bytes());
        key
    }

    /// Every lexicon entry whose index term equals `index_term`
    pub fn lexicon_term_prefix(&self, index_term: &str) -> Vec<u8> {
        let mut key = self.lexicon_prefix(index_term);
        key.push(DELIM);
        key
    }

    /// Every lexicon entry whose index term starts with `prefix`
    pub fn lexicon_prefix(&self, prefix: &str) -> Vec<u8> {
        let mut key = self.with(b"l/");
        key.extend_from_slice(prefix.as_bytes());
        key
    }

    /// `(index_term, raw_term)` of a lexicon key; raw is empty when not stored
    pub fn parse_lexicon<'k>(&self, key: &'k [u8]) -> Option<(&'k str, &'k str)> {
        let rest = key.strip_prefix(self.prefix.as_slice())?.strip_prefix(b"l/")?;
        let split = rest.iter().position(|&b| b == DELIM)?;
        let index_term = std::str::from_utf8(&rest[..split]).ok()?;
        let raw_term = std::str::from_utf8(&rest[split + 1..]).ok()?;
        Some((index_term, raw_term))
    }

    // -------------------------------------------------------------------------
    // Bookkeeping
    // -------------------------------------------------------------------------

    pub fn reverse(&self, token_id: u64) -> Vec<u8> {
        let mut key = self.with(b"r/");
        codec::put_ordered_u64(&mut key, token_id);
        key
    }

    pub fn dirty_prefix(&self) -> Vec<u8> {
        self.with(b"ti/")
    }

    pub fn dirty(&self, token_id: u64) -> Vec<u8> {
        let mut key = self.dirty_prefix();
        codec::put_ordered_u64(&mut key, token_id);
        key
    }

    pub fn parse_dirty(&self, key: &[u8]) -> Option<u64> {
        let mut rest = key
            .strip_prefix(self.prefix.as_slice())?
            .strip_prefix(b"ti/")?;
        let token_id = codec::decode_ordered_u64(&mut rest).ok()?;
        rest.is_empty().then_some(token_id)
    }

    pub fn next_id(&self) -> Vec<u8> {
        self.with(b"m/next_id")
    }

    pub fn document(&self, doc_id: &str) -> Vec<u8> {
        let mut key = self.with(b"d/");
        key.extend_from_slice(doc_id.as_bytes());
        key
    }
}

/// Split the tail of a posting key (after its token prefix) into
/// `(sort_key, doc_id)`
pub fn split_posting_tail(tail: &[u8]) -> Option<(&str, &str)> {
    let split = tail.iter().position(|&b| b == DELIM)?;
    let sort_key = std::str::from_utf8(&tail[..split]).ok()?;
    let doc_id = std::str::from_utf8(&tail[split + 1..]).ok()?;
    Some((sort_key, doc_id))
}
