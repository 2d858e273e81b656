//! Query tree
//!
//! Leaves match lexicon entries; inner nodes combine result streams.

use std::fmt;

use super::terms::parse_terms;

/// A boolean query over index terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Documents containing exactly this index term
    Term(String),
    /// Documents containing any index term starting with this prefix
    Prefix(String),
    /// Documents matched by every child
    And(Vec<Query>),
    /// Documents matched by at least one child
    Or(Vec<Query>),
}

impl Query {
    pub fn term(term: impl Into<String>) -> Self {
        Query::Term(term.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Query::Prefix(prefix.into())
    }

    /// Search-box query: every word must match (in any of its variants), and
    /// the last word matches as a prefix unless the text ends in whitespace.
    ///
    /// Returns `None` when `text` holds no words.
    pub fn parse(text: &str) -> Option<Self> {
        let terms = parse_terms(text);
        let last_position = terms.last()?.position;
        let prefix_last = !text.ends_with(char::is_whitespace);

        let mut words: Vec<Query> = Vec::new();
        let mut variants: Vec<Query> = Vec::new();
        let mut position = 0;
        for term in terms {
            if term.position != position && !variants.is_empty() {
                words.push(collapse_or(std::mem::take(&mut variants)));
            }
            position = term.position;
            variants.push(if prefix_last && term.position == last_position {
                Query::Prefix(term.index_term)
            } else {
                Query::Term(term.index_term)
            });
        }
        words.push(collapse_or(variants));

        Some(if words.len() == 1 {
            words.remove(0)
        } else {
            Query::And(words)
        })
    }
}

fn collapse_or(mut variants: Vec<Query>) -> Query {
    if variants.len() == 1 {
        variants.remove(0)
    } else {
        Query::Or(variants)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, op: &str, children: &[Query]) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(term) => write!(f, "{}", term),
            Query::Prefix(prefix) => write!(f, "{}*", prefix),
            Query::And(children) => write_joined(f, "AND", children),
            Query::Or(children) => write_joined(f, "OR", children),
        }
    }
}
