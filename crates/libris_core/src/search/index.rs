//! Suffix-trie search index over book titles, authors and ids.
//!
//! # Responsibility
//! - Index every suffix of each normalized title/author, truncated to
//!   `MAX_SUFFIX_CHARS`, so one trie walk answers prefix and substring queries.
//! - Confirm longer needles against the stored keys.
//! - Rank hits: id match, then prefix match, then substring match; ties by id.
//!
//! # Invariants
//! - `indexed` holds exactly the strings inserted for each book, so removal
//!   walks the same paths insertion did.
//! - Blank or unmatched queries yield an empty list, never an error.

use super::trie::{MatchKind, Trie};
use crate::model::book::{Book, BookId};
use std::collections::{BTreeMap, HashMap};

/// Deepest trie path a single suffix occupies.
const MAX_SUFFIX_CHARS: usize = 64;

/// One ranked search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub book_id: BookId,
    pub kind: MatchKind,
}

#[derive(Debug, Default)]
pub struct SearchIndex {
    trie: Trie,
    indexed: HashMap<BookId, Vec<String>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards everything and indexes `books` from scratch.
    pub fn rebuild<'a>(&mut self, books: impl IntoIterator<Item = &'a Book>) {
        self.trie = Trie::new();
        self.indexed.clear();
        for book in books {
            self.upsert(book);
        }
    }

    /// Indexes `book`, replacing any previous entry with the same id.
    pub fn upsert(&mut self, book: &Book) {
        self.remove(book.id);

        let mut keys = vec![normalize(&book.title), normalize(&book.author)];
        keys.retain(|key| !key.is_empty());
        keys.dedup();

        for key in &keys {
            for (offset, _) in key.char_indices() {
                let kind = if offset == 0 {
                    MatchKind::Prefix
                } else {
                    MatchKind::Substring
                };
                self.trie.insert(truncated(&key[offset..]), book.id, kind);
            }
        }
        self.indexed.insert(book.id, keys);
    }

    pub fn remove(&mut self, book_id: BookId) {
        let Some(keys) = self.indexed.remove(&book_id) else {
            return;
        };
        for key in &keys {
            for (offset, _) in key.char_indices() {
                self.trie.remove(truncated(&key[offset..]), book_id);
            }
        }
    }

    /// Ranked hits for `text`.
    pub fn query(&self, text: &str) -> Vec<SearchHit> {
        let needle = normalize(text);
        if needle.is_empty() {
            return Vec::new();
        }

        let walked = truncated(&needle);
        let mut best: BTreeMap<BookId, MatchKind> = BTreeMap::new();
        for (book_id, kind) in self.trie.lookup(walked) {
            if walked.len() == needle.len() {
                best.insert(book_id, kind);
            } else if let Some(kind) = self.confirm_long_match(book_id, &needle) {
                best.insert(book_id, kind);
            }
        }
        if let Ok(id) = needle.parse::<BookId>() {
            if self.indexed.contains_key(&id) {
                best.insert(id, MatchKind::Id);
            }
        }

        let mut hits = best
            .into_iter()
            .map(|(book_id, kind)| SearchHit { book_id, kind })
            .collect::<Vec<_>>();
        hits.sort_by_key(|hit| (hit.kind, hit.book_id));
        hits
    }

    /// Re-checks a needle longer than the indexed depth against full keys.
    fn confirm_long_match(&self, book_id: BookId, needle: &str) -> Option<MatchKind> {
        let keys = self.indexed.get(&book_id)?;
        if keys.iter().any(|key| key.starts_with(needle)) {
            Some(MatchKind::Prefix)
        } else if keys.iter().any(|key| key.contains(needle)) {
            Some(MatchKind::Substring)
        } else {
            None
        }
    }
}

/// First `MAX_SUFFIX_CHARS` characters of `value`.
fn truncated(value: &str) -> &str {
    match value.char_indices().nth(MAX_SUFFIX_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
