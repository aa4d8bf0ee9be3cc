//! In-memory token storage.
//!
//! Fast, simple, lost on process exit. Good for testing, short sessions,
//! and ephemeral audits.

use std::collections::HashMap;

use crate::errors::TibetResult;
use crate::token::Token;
use crate::token_store::{TokenFilter, TokenStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: Vec<Token>,
    index: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn add(&mut self, token: Token) -> TibetResult<()> {
        self.index.insert(token.token_id.clone(), self.tokens.len());
        self.tokens.push(token);
        Ok(())
    }

    fn get(&self, token_id: &str) -> TibetResult<Option<Token>> {
        Ok(self.index.get(token_id).map(|&idx| self.tokens[idx].clone()))
    }

    fn all(&self) -> TibetResult<Vec<Token>> {
        Ok(self.tokens.clone())
    }

    fn find(&self, filter: &TokenFilter) -> TibetResult<Vec<Token>> {
        Ok(filter.apply(&self.tokens))
    }

    fn count(&self) -> TibetResult<usize> {
        Ok(self.tokens.len())
    }

    fn clear(&mut self) -> TibetResult<()> {
        self.tokens.clear();
        self.index.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenParams;

    fn token(id: &str, action: &str, ts: &str) -> Token {
        Token::new(TokenParams::new(id, action, ts, "jis:tibet:test")).unwrap()
    }

    #[test]
    fn add_get_count() {
        let mut store = MemoryStore::new();
        store.add(token("a", "login", "2026-01-01T00:00:00Z")).unwrap();
        store.add(token("b", "logout", "2026-01-01T00:01:00Z")).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get("a").unwrap().unwrap().action, "login");
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_id_last_write_wins_in_index() {
        let mut store = MemoryStore::new();
        store.add(token("dup", "first", "2026-01-01T00:00:00Z")).unwrap();
        store.add(token("dup", "second", "2026-01-01T00:01:00Z")).unwrap();

        // index sees the newest, the log keeps both
        assert_eq!(store.get("dup").unwrap().unwrap().action, "second");
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn find_applies_conjunction_and_limit() {
        let mut store = MemoryStore::new();
        for i in 0..5 {
            store
                .add(token(
                    &format!("t{i}"),
                    "login",
                    &format!("2026-01-01T00:0{i}:00Z"),
                ))
                .unwrap();
        }

        let filter = TokenFilter::new().with_action("login").with_limit(1);
        let found = store.find(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].token_id, "t4");

        let filter = TokenFilter::new().with_since("2026-01-01T00:03:00Z");
        assert_eq!(store.find(&filter).unwrap().len(), 2);

        let filter = TokenFilter::new().with_actor("someone-else");
        assert!(store.find(&filter).unwrap().is_empty());
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = MemoryStore::new();
        store.add(token("a", "x", "2026-01-01T00:00:00Z")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.get("a").unwrap().is_none());
    }
}
