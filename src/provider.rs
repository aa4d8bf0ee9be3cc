//! Token provider — the creation facade over Token and Store.
//!
//! A provider carries a consistent actor identity, mints identifiers and
//! timestamps, persists every created token, and (optionally) auto-chains
//! sequential calls so each token's `parent_id` points at the previous
//! one. The identifier generator and clock are injected collaborators
//! with sensible defaults; tests swap them for deterministic sources.

use std::collections::HashMap;
use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{TibetError, TibetResult};
use crate::token::{Token, TokenParams, TokenState};
use crate::token_store::{TokenFilter, TokenStore};
use crate::token_store_memory::MemoryStore;

/// Callback fired for each created token.
pub type TokenCallback = Box<dyn Fn(&Token) + Send + Sync>;

type StringSource = Box<dyn Fn() -> String + Send + Sync>;

fn default_token_id() -> String {
    format!("tibet_{}", Uuid::new_v4().simple())
}

fn default_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Everything a caller supplies to record one action. Identifier,
/// timestamp, and (unless overridden) actor and parent come from the
/// provider.
#[derive(Debug, Clone, Default)]
pub struct TokenDraft {
    action: String,
    erin: Value,
    eraan: Vec<String>,
    eromheen: Map<String, Value>,
    erachter: String,
    actor: Option<String>,
    parent_id: Option<String>,
    state: TokenState,
}

impl TokenDraft {
    pub fn new(action: impl Into<String>) -> Self {
        TokenDraft {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Content/data of the action.
    pub fn with_erin(mut self, erin: Value) -> Self {
        self.erin = erin;
        self
    }

    /// Attach one reference id.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.eraan.push(reference.into());
        self
    }

    /// Replace the full reference list.
    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.eraan = references;
        self
    }

    /// Add one contextual metadata entry.
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.eromheen.insert(key.into(), value);
        self
    }

    /// Intent/reason for the action.
    pub fn with_erachter(mut self, erachter: impl Into<String>) -> Self {
        self.erachter = erachter.into();
        self
    }

    /// Override the provider's default actor for this token.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Explicit parent link. Takes precedence over auto-chaining.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_state(mut self, state: TokenState) -> Self {
        self.state = state;
        self
    }
}

/// Output encodings for [`Provider::export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array of full records.
    Json,
    /// One canonical JSON record per line.
    JsonLines,
}

/// Result of an integrity sweep over the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub valid: usize,
    pub corrupted: Vec<String>,
    pub intact: bool,
}

/// Creates tokens with consistent actor identity and persistence.
pub struct Provider {
    actor: String,
    store: Box<dyn TokenStore>,
    on_token: Option<TokenCallback>,
    auto_chain: bool,
    last_token_id: Option<String>,
    id_source: StringSource,
    clock: StringSource,
}

impl Provider {
    /// New provider over an in-memory store, auto-chaining enabled.
    pub fn new(actor: impl Into<String>) -> Self {
        Provider {
            actor: actor.into(),
            store: Box::new(MemoryStore::new()),
            on_token: None,
            auto_chain: true,
            last_token_id: None,
            id_source: Box::new(default_token_id),
            clock: Box::new(default_timestamp),
        }
    }

    pub fn with_store(mut self, store: Box<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_auto_chain(mut self, auto_chain: bool) -> Self {
        self.auto_chain = auto_chain;
        self
    }

    pub fn with_callback(mut self, callback: impl Fn(&Token) + Send + Sync + 'static) -> Self {
        self.on_token = Some(Box::new(callback));
        self
    }

    /// Inject the identifier generator (default: `tibet_<uuid>`).
    pub fn with_id_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_source = Box::new(source);
        self
    }

    /// Inject the clock (default: UTC RFC 3339 with microseconds).
    pub fn with_clock(mut self, clock: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Record one action as a new token and store it.
    ///
    /// An explicit parent in the draft wins; otherwise, with auto-chaining
    /// on, the token links to the previously created one.
    pub fn create(&mut self, draft: TokenDraft) -> TibetResult<Token> {
        let parent_id = draft.parent_id.or_else(|| {
            if self.auto_chain {
                self.last_token_id.clone()
            } else {
                None
            }
        });

        let mut params = TokenParams::new(
            (self.id_source)(),
            draft.action,
            (self.clock)(),
            draft.actor.unwrap_or_else(|| self.actor.clone()),
        );
        params.erin = draft.erin;
        params.eraan = draft.eraan;
        params.eromheen = draft.eromheen;
        params.erachter = draft.erachter;
        params.parent_id = parent_id;
        params.state = draft.state;

        let token = Token::new(params)?;
        self.store.add(token.clone())?;
        self.last_token_id = Some(token.token_id.clone());

        debug!(token_id = %token.token_id, action = %token.action, "token recorded");

        if let Some(callback) = &self.on_token {
            callback(&token);
        }

        Ok(token)
    }

    /// Record a state change as a new `state_change` token chained to the
    /// original. The original is never mutated. `Ok(None)` if the id is
    /// unknown.
    pub fn update_state(
        &mut self,
        token_id: &str,
        new_state: TokenState,
        reason: impl Into<String>,
    ) -> TibetResult<Option<Token>> {
        let Some(original) = self.store.get(token_id)? else {
            return Ok(None);
        };

        let reason = reason.into();
        let erachter = if reason.is_empty() {
            format!("state change: {} -> {}", original.state, new_state)
        } else {
            reason
        };

        let draft = TokenDraft::new("state_change")
            .with_erin(json!({
                "token_id": token_id,
                "old_state": original.state.as_str(),
                "new_state": new_state.as_str(),
            }))
            .with_reference(token_id)
            .with_erachter(erachter)
            .with_parent(token_id);

        self.create(draft).map(Some)
    }

    /// Borrow the underlying store, e.g. to hand it to a
    /// [`crate::chain::Chain`].
    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    pub fn get(&self, token_id: &str) -> TibetResult<Option<Token>> {
        self.store.get(token_id)
    }

    pub fn find(&self, filter: &TokenFilter) -> TibetResult<Vec<Token>> {
        self.store.find(filter)
    }

    pub fn count(&self) -> TibetResult<usize> {
        self.store.count()
    }

    /// Clear the store and the auto-chain tail. Destructive.
    pub fn clear(&mut self) -> TibetResult<()> {
        self.store.clear()?;
        self.last_token_id = None;
        Ok(())
    }

    /// Serialize the full store for external consumption.
    pub fn export(&self, format: ExportFormat) -> TibetResult<String> {
        let tokens = self.store.all()?;
        match format {
            ExportFormat::Json => {
                let values: Vec<Value> = tokens
                    .iter()
                    .map(Token::to_value)
                    .collect::<TibetResult<_>>()?;
                serde_json::to_string_pretty(&values)
                    .map_err(|e| TibetError::encoding(format!("export: {e}")))
            }
            ExportFormat::JsonLines => {
                let lines: Vec<String> = tokens
                    .iter()
                    .map(Token::to_json)
                    .collect::<TibetResult<_>>()?;
                Ok(lines.join("\n"))
            }
        }
    }

    /// Per-token integrity check over the whole store.
    pub fn verify_all(&self) -> TibetResult<HashMap<String, bool>> {
        Ok(self
            .store
            .all()?
            .iter()
            .map(|t| (t.token_id.clone(), t.verify()))
            .collect())
    }

    /// Aggregate integrity sweep: how many records verify, and which ids
    /// do not.
    pub fn integrity_report(&self) -> TibetResult<IntegrityReport> {
        let mut valid = 0;
        let mut corrupted = Vec::new();
        for token in self.store.all()? {
            if token.verify() {
                valid += 1;
            } else {
                corrupted.push(token.token_id);
            }
        }
        Ok(IntegrityReport {
            valid,
            intact: corrupted.is_empty(),
            corrupted,
        })
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("actor", &self.actor)
            .field("auto_chain", &self.auto_chain)
            .field("last_token_id", &self.last_token_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic_provider() -> Provider {
        use std::sync::atomic::{AtomicU64, Ordering};
        let ids = AtomicU64::new(0);
        let clock = AtomicU64::new(0);
        Provider::new("jis:tibet:test")
            .with_id_source(move || format!("t{}", ids.fetch_add(1, Ordering::SeqCst)))
            .with_clock(move || {
                format!(
                    "2026-08-07T10:00:{:02}.000000Z",
                    clock.fetch_add(1, Ordering::SeqCst)
                )
            })
    }

    #[test]
    fn auto_chain_links_sequential_tokens() {
        let mut provider = deterministic_provider();
        let first = provider.create(TokenDraft::new("login")).unwrap();
        let second = provider.create(TokenDraft::new("search")).unwrap();

        assert!(first.parent_id.is_none());
        assert_eq!(second.parent_id.as_deref(), Some(first.token_id.as_str()));
    }

    #[test]
    fn explicit_parent_beats_auto_chain() {
        let mut provider = deterministic_provider();
        let first = provider.create(TokenDraft::new("login")).unwrap();
        let _second = provider.create(TokenDraft::new("search")).unwrap();
        let third = provider
            .create(TokenDraft::new("retry").with_parent(first.token_id.clone()))
            .unwrap();

        assert_eq!(third.parent_id.as_deref(), Some(first.token_id.as_str()));
    }

    #[test]
    fn update_state_records_a_chained_token() {
        let mut provider = deterministic_provider();
        let original = provider
            .create(TokenDraft::new("incident").with_state(TokenState::Detected))
            .unwrap();

        let change = provider
            .update_state(&original.token_id, TokenState::Mitigated, "")
            .unwrap()
            .expect("original exists");

        assert_eq!(change.action, "state_change");
        assert_eq!(change.parent_id.as_deref(), Some(original.token_id.as_str()));
        assert_eq!(change.eraan, vec![original.token_id.clone()]);
        assert_eq!(change.erin["old_state"], "detected");
        assert_eq!(change.erin["new_state"], "mitigated");

        assert!(provider
            .update_state("unknown", TokenState::Resolved, "")
            .unwrap()
            .is_none());
    }

    #[test]
    fn export_jsonl_round_trips() {
        let mut provider = deterministic_provider();
        provider.create(TokenDraft::new("one")).unwrap();
        provider.create(TokenDraft::new("two")).unwrap();

        let jsonl = provider.export(ExportFormat::JsonLines).unwrap();
        let decoded: Vec<Token> = jsonl
            .lines()
            .map(|l| Token::from_json(l).unwrap())
            .collect();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(Token::verify));
    }

    #[test]
    fn integrity_report_counts_everything() {
        let mut provider = deterministic_provider();
        provider.create(TokenDraft::new("one")).unwrap();
        provider.create(TokenDraft::new("two")).unwrap();

        let report = provider.integrity_report().unwrap();
        assert_eq!(report.valid, 2);
        assert!(report.intact);
        assert!(report.corrupted.is_empty());
    }

    #[test]
    fn callback_sees_every_token() {
        use std::sync::{Arc, Mutex};
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut provider = Provider::new("jis:tibet:test")
            .with_callback(move |t| sink.lock().unwrap().push(t.action.clone()));
        provider.create(TokenDraft::new("login")).unwrap();
        provider.create(TokenDraft::new("logout")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["login", "logout"]);
    }
}
