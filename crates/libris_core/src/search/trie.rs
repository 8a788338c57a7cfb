//! Character trie with per-node book id sets.
//!
//! # Invariants
//! - Keys are inserted already normalized (lower-cased); the trie does not
//!   normalize on its own.
//! - A node's `hits` lists every book that inserted a key passing through it,
//!   with the best `MatchKind` seen for that book.
//! - Nodes left without hits or children are pruned on removal.
//! - Insert, lookup and remove walk keys iteratively.

use crate::model::book::BookId;
use std::collections::BTreeMap;

/// How a query relates to the indexed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    /// Query equals the book id.
    Id,
    /// Title or author starts with the query.
    Prefix,
    /// Query appears inside the title or author.
    Substring,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<char, TrieNode>,
    hits: BTreeMap<BookId, MatchKind>,
}

#[derive(Debug, Default)]
pub struct Trie {
    root: TrieNode,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `book_id` on every node along `key`.
    pub fn insert(&mut self, key: &str, book_id: BookId, kind: MatchKind) {
        let mut node = &mut self.root;
        for ch in key.chars() {
            node = node.children.entry(ch).or_default();
            node.hits
                .entry(book_id)
                .and_modify(|best| *best = (*best).min(kind))
                .or_insert(kind);
        }
    }

    /// Removes `book_id` from every node along `key`, then cuts off the tail
    /// of the path left without hits or side branches.
    pub fn remove(&mut self, key: &str, book_id: BookId) {
        let chars = key.chars().collect::<Vec<_>>();

        let mut node = &mut self.root;
        for ch in &chars {
            match node.children.get_mut(ch) {
                Some(next) => {
                    next.hits.remove(&book_id);
                    node = next;
                }
                None => return,
            }
        }

        let Some(depth) = self.prune_depth(&chars) else {
            return;
        };
        let mut parent = &mut self.root;
        for ch in &chars[..depth] {
            match parent.children.get_mut(ch) {
                Some(next) => parent = next,
                None => return,
            }
        }
        parent.children.remove(&chars[depth]);
    }

    /// Index into `path` of the shallowest node whose whole tail along
    /// `path` is dead weight.
    fn prune_depth(&self, path: &[char]) -> Option<usize> {
        let mut node = &self.root;
        let mut prune_from = None;
        for (index, ch) in path.iter().enumerate() {
            node = node.children.get(ch)?;
            let only_path_child = if index + 1 == path.len() {
                node.children.is_empty()
            } else {
                node.children.len() == 1
            };
            if node.hits.is_empty() && only_path_child {
                prune_from.get_or_insert(index);
            } else {
                prune_from = None;
            }
        }
        prune_from
    }

    /// Books reachable by walking `key`, with their best match kind.
    pub fn lookup(&self, key: &str) -> Vec<(BookId, MatchKind)> {
        let mut node = &self.root;
        for ch in key.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }
        if std::ptr::eq(node, &self.root) {
            return Vec::new();
        }
        node.hits.iter().map(|(id, kind)| (*id, *kind)).collect()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.root.hits.is_empty()
    }
}
