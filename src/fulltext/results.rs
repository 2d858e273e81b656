//! Result Iterators
//!
//! Streams of matching documents in `(sort_key, doc_id)` order.
//!
//! ## Composition
//! ```text
//!            ResultIterator
//!   ┌───────┬──────┴──────┬─────────────┐
//! Empty   Token          And            Or
//!          │          (leapfrog)    (min-heap)
//!     posting cursor
//! ```
//!
//! Every variant is strictly monotonic: `next()` and `seek()` never move a
//! stream backwards, so a document is visited at most once.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use crate::db::Cursor;

use super::keys::{split_posting_tail, FIELD_DELIMITER};

/// Position of a result: documents are ordered by sort key, then id
///
/// Ordering is that of the posting key tail `sort_key \t doc_id` compared as
/// bytes, so a sort key sorts after any sort key it strictly extends only
/// when the extension starts above the delimiter.
#[derive(Debug, Clone)]
pub struct DocKey {
    pub sort_key: String,
    pub doc_id: String,
}

impl DocKey {
    pub fn new(sort_key: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            sort_key: sort_key.into(),
            doc_id: doc_id.into(),
        }
    }

    fn tail_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.sort_key
            .bytes()
            .chain(std::iter::once(FIELD_DELIMITER as u8))
            .chain(self.doc_id.bytes())
    }
}

impl PartialEq for DocKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DocKey {}

impl PartialOrd for DocKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tail_bytes().cmp(other.tail_bytes())
    }
}

/// Matching documents of a query, generic over the view's cursor
pub enum ResultIterator<C: Cursor> {
    Empty,
    Token(TokenIterator<C>),
    And(AndIterator<C>),
    Or(OrIterator<C>),
}

impl<C: Cursor> ResultIterator<C> {
    pub fn valid(&self) -> bool {
        self.position().is_some()
    }

    /// Current document; `None` once exhausted
    pub fn position(&self) -> Option<&DocKey> {
        match self {
            ResultIterator::Empty => None,
            ResultIterator::Token(it) => it.current.as_ref(),
            ResultIterator::And(it) => it.current.as_ref(),
            ResultIterator::Or(it) => it.current.as_ref(),
        }
    }

    pub fn doc_id(&self) -> &str {
        self.position().map_or("", |p| p.doc_id.as_str())
    }

    pub fn sort_key(&self) -> &str {
        self.position().map_or("", |p| p.sort_key.as_str())
    }

    /// Advance past the current document; no-op once exhausted
    pub fn next(&mut self) {
        match self {
            ResultIterator::Empty => {}
            ResultIterator::Token(it) => it.next(),
            ResultIterator::And(it) => it.next(),
            ResultIterator::Or(it) => it.next(),
        }
    }

    /// Advance to the first document `>= target`; never moves backwards
    pub fn seek(&mut self, target: &DocKey) {
        match self {
            ResultIterator::Empty => {}
            ResultIterator::Token(it) => it.seek(target),
            ResultIterator::And(it) => it.seek(target),
            ResultIterator::Or(it) => it.seek(target),
        }
    }

    /// Raw terms that matched the current document, for highlighting
    pub fn raw_terms(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_raw_terms(&mut out);
        out
    }

    fn collect_raw_terms(&self, out: &mut BTreeSet<String>) {
        match self {
            ResultIterator::Empty => {}
            ResultIterator::Token(it) => {
                if it.current.is_some() {
                    out.insert(it.raw_term.clone());
                }
            }
            ResultIterator::And(it) => {
                if it.current.is_some() {
                    for child in &it.children {
                        child.collect_raw_terms(out);
                    }
                }
            }
            ResultIterator::Or(it) => {
                if let Some(current) = &it.current {
                    for entry in it.heap.iter() {
                        if entry.0.position() == Some(current) {
                            entry.0.collect_raw_terms(out);
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Token
// =============================================================================

/// Postings of one token, read straight off a store cursor
pub struct TokenIterator<C: Cursor> {
    cursor: C,
    prefix: Vec<u8>,
    raw_term: String,
    current: Option<DocKey>,
}

impl<C: Cursor> TokenIterator<C> {
    /// `cursor` must iterate forward; it is positioned at `prefix` here
    pub(crate) fn new(mut cursor: C, prefix: Vec<u8>, raw_term: String) -> Self {
        cursor.seek(&prefix);
        let mut it = Self {
            cursor,
            prefix,
            raw_term,
            current: None,
        };
        it.load();
        it
    }

    pub fn raw_term(&self) -> &str {
        &self.raw_term
    }

    fn load(&mut self) {
        loop {
            if !self.cursor.valid() || !self.cursor.key().starts_with(&self.prefix) {
                self.current = None;
                return;
            }
            let tail = &self.cursor.key()[self.prefix.len()..];
            match split_posting_tail(tail) {
                Some((sort_key, doc_id)) => {
                    self.current = Some(DocKey::new(sort_key, doc_id));
                    return;
                }
                None => {
                    tracing::warn!(key = ?self.cursor.key(), "skipping malformed posting key");
                    self.cursor.next();
                }
            }
        }
    }

    fn next(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.cursor.next();
        self.load();
    }

    fn seek(&mut self, target: &DocKey) {
        match &self.current {
            Some(current) if current < target => {}
            _ => return,
        }
        let mut key = self.prefix.clone();
        key.extend_from_slice(target.sort_key.as_bytes());
        key.push(FIELD_DELIMITER as u8);
        key.extend_from_slice(target.doc_id.as_bytes());
        self.cursor.seek(&key);
        self.load();
    }
}

// =============================================================================
// And
// =============================================================================

/// Intersection: lagging children leapfrog to the furthest child
pub struct AndIterator<C: Cursor> {
    children: Vec<ResultIterator<C>>,
    current: Option<DocKey>,
}

impl<C: Cursor> AndIterator<C> {
    pub(crate) fn new(children: Vec<ResultIterator<C>>) -> Self {
        let mut it = Self {
            children,
            current: None,
        };
        it.align();
        it
    }

    fn align(&mut self) {
        loop {
            let mut furthest: Option<DocKey> = None;
            for child in &self.children {
                match child.position() {
                    None => {
                        self.current = None;
                        return;
                    }
                    Some(pos) => {
                        if furthest.as_ref().map_or(true, |f| pos > f) {
                            furthest = Some(pos.clone());
                        }
                    }
                }
            }
            let Some(target) = furthest else {
                self.current = None;
                return;
            };

            let mut aligned = true;
            for child in &mut self.children {
                if child.position() != Some(&target) {
                    child.seek(&target);
                    aligned = false;
                }
            }
            if aligned {
                self.current = Some(target);
                return;
            }
        }
    }

    fn next(&mut self) {
        if self.current.is_none() {
            return;
        }
        if let Some(first) = self.children.first_mut() {
            first.next();
        }
        self.align();
    }

    fn seek(&mut self, target: &DocKey) {
        if self.current.as_ref().map_or(true, |c| c >= target) {
            return;
        }
        for child in &mut self.children {
            child.seek(target);
        }
        self.align();
    }
}

// =============================================================================
// Or
// =============================================================================

/// Heap entry ordered so that `BinaryHeap` pops the smallest position first
struct HeapEntry<C: Cursor>(ResultIterator<C>);

impl<C: Cursor> PartialEq for HeapEntry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.0.position() == other.0.position()
    }
}

impl<C: Cursor> Eq for HeapEntry<C> {}

impl<C: Cursor> PartialOrd for HeapEntry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: Cursor> Ord for HeapEntry<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.position().cmp(&self.0.position())
    }
}

/// Union over a min-heap of children; each document is emitted once
pub struct OrIterator<C: Cursor> {
    heap: BinaryHeap<HeapEntry<C>>,
    current: Option<DocKey>,
}

impl<C: Cursor> OrIterator<C> {
    pub(crate) fn new(children: Vec<ResultIterator<C>>) -> Self {
        let heap = children
            .into_iter()
            .filter(ResultIterator::valid)
            .map(HeapEntry)
            .collect();
        let mut it = Self {
            heap,
            current: None,
        };
        it.refresh();
        it
    }

    fn refresh(&mut self) {
        self.current = self.heap.peek().and_then(|e| e.0.position().cloned());
    }

    fn next(&mut self) {
        let Some(emitted) = self.current.take() else {
            return;
        };
        while self
            .heap
            .peek()
            .map_or(false, |e| e.0.position().map_or(true, |p| *p <= emitted))
        {
            let Some(HeapEntry(mut child)) = self.heap.pop() else {
                break;
            };
            while child.position().map_or(false, |p| *p <= emitted) {
                child.next();
            }
            if child.valid() {
                self.heap.push(HeapEntry(child));
            }
        }
        self.refresh();
    }

    fn seek(&mut self, target: &DocKey) {
        if self.current.as_ref().map_or(true, |c| c >= target) {
            return;
        }
        let children: Vec<_> = std::mem::take(&mut self.heap).into_vec();
        for HeapEntry(mut child) in children {
            child.seek(target);
            if child.valid() {
                self.heap.push(HeapEntry(child));
            }
        }
        self.refresh();
    }
}
