//! Token storage abstraction.
//!
//! A store is an append-only log of tokens with an id index on top.
//! Individual records are never updated or deleted; the only destructive
//! operation is a full [`TokenStore::clear`]. Duplicate `token_id`s are
//! not rejected: the log keeps every record while the index points at the
//! most recent write, and that precedence survives a reload.

use crate::errors::TibetResult;
use crate::token::Token;

/// Default cap on [`TokenStore::find`] results.
pub const DEFAULT_FIND_LIMIT: usize = 100;

/// Filter criteria for [`TokenStore::find`]. Every supplied field must
/// match (conjunction); `since` compares ISO-8601 timestamps
/// lexicographically.
#[derive(Debug, Clone)]
pub struct TokenFilter {
    pub action: Option<String>,
    pub actor: Option<String>,
    pub since: Option<String>,
    pub limit: usize,
}

impl Default for TokenFilter {
    fn default() -> Self {
        TokenFilter {
            action: None,
            actor: None,
            since: None,
            limit: DEFAULT_FIND_LIMIT,
        }
    }
}

impl TokenFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, token: &Token) -> bool {
        if let Some(action) = &self.action {
            if &token.action != action {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if &token.actor != actor {
                return false;
            }
        }
        if let Some(since) = &self.since {
            if token.timestamp.as_str() < since.as_str() {
                return false;
            }
        }
        true
    }

    /// Apply the filter over an insertion-ordered slice, keeping the
    /// newest `limit` matches in their original order. Shared by every
    /// backend so the contract cannot drift.
    pub(crate) fn apply(&self, tokens: &[Token]) -> Vec<Token> {
        let matches: Vec<&Token> = tokens.iter().filter(|t| self.matches(t)).collect();
        let skip = matches.len().saturating_sub(self.limit);
        matches.into_iter().skip(skip).cloned().collect()
    }
}

/// Append-only persistence for tokens, keyed by `token_id`.
///
/// Both backends implement identical semantics; they differ only in
/// durability. Reads return snapshots — callers must not assume a live
/// view. No internal locking: single-writer use is assumed, and callers
/// needing concurrent access wrap the store in their own exclusion.
pub trait TokenStore: Send + Sync {
    /// Insert a token. Duplicate ids are accepted (last write wins in the
    /// index).
    fn add(&mut self, token: Token) -> TibetResult<()>;

    /// Look up a token by id. Absent ids are `Ok(None)`, never an error.
    fn get(&self, token_id: &str) -> TibetResult<Option<Token>>;

    /// Every stored token in insertion order, as a snapshot.
    fn all(&self) -> TibetResult<Vec<Token>>;

    /// Tokens matching the filter, newest `limit` of them, insertion order
    /// preserved.
    fn find(&self, filter: &TokenFilter) -> TibetResult<Vec<Token>>;

    /// Number of stored records (duplicates included).
    fn count(&self) -> TibetResult<usize>;

    /// Remove every record. Destructive and not audit-safe; production
    /// callers needing tamper evidence must not call this.
    fn clear(&mut self) -> TibetResult<()>;
}
