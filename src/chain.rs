//! Provenance chain utilities.
//!
//! A chain is the backward sequence of tokens reachable from a starting
//! token through `parent_id` links. `Chain` walks those links through a
//! store to reconstruct history, verify integrity transitively, and build
//! a forward tree from a root. It holds no tokens of its own — the store
//! stays authoritative.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::errors::TibetResult;
use crate::token::Token;
use crate::token_store::TokenStore;

/// Default backward-walk bound for [`Chain::trace`].
pub const DEFAULT_TRACE_DEPTH: usize = 100;
/// Default recursion bound for [`Chain::tree`].
pub const DEFAULT_TREE_DEPTH: usize = 10;

/// Aggregate view of one trace, suitable for rendering as JSON.
///
/// An empty trace reports `length: 0, valid: false` and omits the other
/// fields.
#[derive(Debug, Clone, Serialize)]
pub struct ChainSummary {
    pub length: usize,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

/// One node of the forward tree built by [`Chain::tree`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TokenTree {
    /// A parent link pointed at an id the store does not hold.
    Missing { id: String, missing: bool },
    /// Recursion stopped at the depth cap below this id.
    Truncated { id: String, truncated: bool },
    Node {
        id: String,
        action: String,
        actor: String,
        timestamp: String,
        erachter: String,
        valid: bool,
        children: Vec<TokenTree>,
    },
}

impl TokenTree {
    fn missing(id: impl Into<String>) -> Self {
        TokenTree::Missing {
            id: id.into(),
            missing: true,
        }
    }

    fn truncated(id: impl Into<String>) -> Self {
        TokenTree::Truncated {
            id: id.into(),
            truncated: true,
        }
    }
}

/// Provenance chain walker over a token store.
pub struct Chain<'a> {
    store: &'a dyn TokenStore,
}

impl<'a> Chain<'a> {
    pub fn new(store: &'a dyn TokenStore) -> Self {
        Chain { store }
    }

    /// Trace the provenance chain backwards, newest first.
    ///
    /// The walk stops when the parent link is absent, the referenced token
    /// is not in the store, `max_depth` tokens have been collected, or an
    /// already-visited id comes around again. The cycle guard truncates
    /// silently — malformed parent links must not loop forever.
    pub fn trace(&self, token_id: &str, max_depth: usize) -> TibetResult<Vec<Token>> {
        let mut chain: Vec<Token> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = Some(token_id.to_string());

        while let Some(id) = current {
            if chain.len() >= max_depth || !seen.insert(id.clone()) {
                break;
            }
            match self.store.get(&id)? {
                Some(token) => {
                    current = token.parent_id.clone();
                    chain.push(token);
                }
                None => break,
            }
        }

        Ok(chain)
    }

    /// Verify the integrity of an entire chain.
    ///
    /// True iff the trace is non-empty and every token in it passes
    /// [`Token::verify`]. A missing starting id yields an empty trace and
    /// therefore `false`.
    pub fn verify(&self, token_id: &str) -> TibetResult<bool> {
        let chain = self.trace(token_id, DEFAULT_TRACE_DEPTH)?;
        Ok(!chain.is_empty() && chain.iter().all(Token::verify))
    }

    /// Summarize a trace: length, validity, distinct actors, the action
    /// sequence (trace order), and the time span from oldest to newest.
    pub fn summary(&self, token_id: &str) -> TibetResult<ChainSummary> {
        let chain = self.trace(token_id, DEFAULT_TRACE_DEPTH)?;

        if chain.is_empty() {
            return Ok(ChainSummary {
                length: 0,
                valid: false,
                actors: Vec::new(),
                actions: Vec::new(),
                start: None,
                end: None,
                root_id: None,
            });
        }

        let actors: BTreeSet<String> = chain.iter().map(|t| t.actor.clone()).collect();
        let oldest = &chain[chain.len() - 1];

        Ok(ChainSummary {
            length: chain.len(),
            valid: chain.iter().all(Token::verify),
            actors: actors.into_iter().collect(),
            actions: chain.iter().map(|t| t.action.clone()).collect(),
            start: Some(oldest.timestamp.clone()),
            end: Some(chain[0].timestamp.clone()),
            root_id: Some(oldest.token_id.clone()),
        })
    }

    /// The oldest ancestor reachable within the default depth bound.
    ///
    /// This is the last element of the trace — a depth-bounded
    /// approximation, not a global root search: if the real chain is
    /// longer than the bound, the true root is out of reach.
    pub fn find_root(&self, token_id: &str) -> TibetResult<Option<Token>> {
        let chain = self.trace(token_id, DEFAULT_TRACE_DEPTH)?;
        Ok(chain.into_iter().last())
    }

    /// Every token whose `parent_id` is the given id, in store insertion
    /// order. Full linear scan — the core favors write-heavy append-only
    /// logs over an auxiliary child index.
    pub fn find_children(&self, token_id: &str) -> TibetResult<Vec<Token>> {
        Ok(self
            .store
            .all()?
            .into_iter()
            .filter(|t| t.parent_id.as_deref() == Some(token_id))
            .collect())
    }

    /// Build the forward tree from a root token down through
    /// [`Chain::find_children`].
    ///
    /// Depth beyond `max_depth` yields a truncated leaf; a referenced but
    /// absent id yields a missing leaf. The depth cap is the only bound:
    /// a parent/child cycle produces duplicated subtrees up to the cap
    /// rather than an error.
    pub fn tree(&self, root_id: &str, max_depth: usize) -> TibetResult<TokenTree> {
        self.build_node(root_id, 0, max_depth)
    }

    fn build_node(&self, token_id: &str, depth: usize, max_depth: usize) -> TibetResult<TokenTree> {
        if depth > max_depth {
            return Ok(TokenTree::truncated(token_id));
        }

        let Some(token) = self.store.get(token_id)? else {
            return Ok(TokenTree::missing(token_id));
        };

        let mut children = Vec::new();
        for child in self.find_children(token_id)? {
            children.push(self.build_node(&child.token_id, depth + 1, max_depth)?);
        }

        Ok(TokenTree::Node {
            id: token.token_id.clone(),
            action: token.action.clone(),
            actor: token.actor.clone(),
            timestamp: token.timestamp.clone(),
            erachter: token.erachter.clone(),
            valid: token.verify(),
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenParams};
    use crate::token_store_memory::MemoryStore;
    use crate::token_store::TokenStore as _;

    fn linked(id: &str, action: &str, ts: &str, parent: Option<&str>) -> Token {
        let mut params = TokenParams::new(id, action, ts, "jis:tibet:test");
        params.parent_id = parent.map(String::from);
        Token::new(params).unwrap()
    }

    #[test]
    fn trace_walks_newest_first() {
        let mut store = MemoryStore::new();
        store.add(linked("a", "login", "2026-01-01T00:00:00Z", None)).unwrap();
        store.add(linked("b", "search", "2026-01-01T00:01:00Z", Some("a"))).unwrap();
        store.add(linked("c", "logout", "2026-01-01T00:02:00Z", Some("b"))).unwrap();

        let chain = Chain::new(&store);
        let trace = chain.trace("c", DEFAULT_TRACE_DEPTH).unwrap();
        let ids: Vec<&str> = trace.iter().map(|t| t.token_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn cycle_terminates() {
        let mut store = MemoryStore::new();
        store.add(linked("a", "x", "2026-01-01T00:00:00Z", Some("b"))).unwrap();
        store.add(linked("b", "y", "2026-01-01T00:01:00Z", Some("a"))).unwrap();

        let chain = Chain::new(&store);
        let trace = chain.trace("a", 100).unwrap();
        assert!(trace.len() <= 2);
    }

    #[test]
    fn self_parent_terminates() {
        let mut store = MemoryStore::new();
        store.add(linked("a", "x", "2026-01-01T00:00:00Z", Some("a"))).unwrap();

        let chain = Chain::new(&store);
        assert_eq!(chain.trace("a", 100).unwrap().len(), 1);
    }

    #[test]
    fn verify_is_false_for_missing_id() {
        let store = MemoryStore::new();
        let chain = Chain::new(&store);
        assert!(!chain.verify("nowhere").unwrap());
    }

    #[test]
    fn max_depth_caps_the_walk() {
        let mut store = MemoryStore::new();
        store.add(linked("a", "x", "2026-01-01T00:00:00Z", None)).unwrap();
        store.add(linked("b", "y", "2026-01-01T00:01:00Z", Some("a"))).unwrap();
        store.add(linked("c", "z", "2026-01-01T00:02:00Z", Some("b"))).unwrap();

        let chain = Chain::new(&store);
        assert_eq!(chain.trace("c", 2).unwrap().len(), 2);
    }
}
