//! Term extraction
//!
//! Pipeline: UAX#29 word boundaries → lowercase → denormalized variants
//! (punctuation stripped, ASCII-folded transliteration). Every variant keeps
//! the position of the word it came from and the word itself as raw term.

use unicode_segmentation::UnicodeSegmentation;

use super::keys::FIELD_DELIMITER;

/// One term to index or look up
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexTerm {
    /// Normalized form matched by queries
    pub index_term: String,
    /// The word as written (lowercased), used for highlighting
    pub raw_term: String,
    /// Index of the originating word in the input
    pub position: u32,
}

impl IndexTerm {
    /// The raw term as stored in the lexicon: empty when it adds nothing
    pub fn stored_raw(&self) -> &str {
        if self.raw_term == self.index_term {
            ""
        } else {
            &self.raw_term
        }
    }
}

/// Split `text` into words and emit each word plus its distinct variants
///
/// ```
/// use tidekv::fulltext::parse_terms;
///
/// let terms = parse_terms("Café");
/// let index_terms: Vec<_> = terms.iter().map(|t| t.index_term.as_str()).collect();
/// assert_eq!(index_terms, vec!["café", "cafe"]);
/// assert!(terms.iter().all(|t| t.raw_term == "café"));
/// ```
pub fn parse_terms(text: &str) -> Vec<IndexTerm> {
    let mut out = Vec::new();
    for (position, word) in text.unicode_words().enumerate() {
        let raw = word.to_lowercase();
        for variant in denormalize(&raw) {
            out.push(IndexTerm {
                index_term: variant,
                raw_term: raw.clone(),
                position: position as u32,
            });
        }
    }
    out
}

/// A single exact term: no splitting, no case folding, no variants
///
/// For structured tags (entity ids and the like) that must match exactly.
pub fn verbatim_term(text: &str) -> IndexTerm {
    let term: String = text.chars().filter(|&c| c != FIELD_DELIMITER).collect();
    IndexTerm {
        index_term: term.clone(),
        raw_term: term,
        position: 0,
    }
}

/// `word` itself followed by its distinct non-empty variants
pub(crate) fn denormalize(word: &str) -> Vec<String> {
    let mut variants = vec![word.to_string()];

    let stripped: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
    push_distinct(&mut variants, stripped);

    let folded: String = deunicode::deunicode(word)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    push_distinct(&mut variants, folded);

    variants
}

fn push_distinct(variants: &mut Vec<String>, candidate: String) {
    if !candidate.is_empty() && !variants.contains(&candidate) {
        variants.push(candidate);
    }
}
