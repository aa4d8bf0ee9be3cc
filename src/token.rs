//! The TIBET token — the atomic unit of provenance.
//!
//! Each token captures the four provenance facets of one action:
//! what happened (`erin`), what it relates to (`eraan`), the context
//! around it (`eromheen`), and the intent behind it (`erachter`).
//! A token is constructed once, gets a SHA-256 content hash over its
//! semantic fields, and is treated as immutable from then on. Updates
//! are new tokens whose `parent_id` points at the previous one.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::canonicalize::canonical_json;
use crate::errors::{TibetError, TibetResult};

/// Token lifecycle states. A closed vocabulary: unknown strings fail to
/// decode rather than passing through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    #[default]
    Created,
    Detected,
    Classified,
    Mitigated,
    Resolved,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Created => "created",
            TokenState::Detected => "detected",
            TokenState::Classified => "classified",
            TokenState::Mitigated => "mitigated",
            TokenState::Resolved => "resolved",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenState {
    type Err = TibetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TokenState::Created),
            "detected" => Ok(TokenState::Detected),
            "classified" => Ok(TokenState::Classified),
            "mitigated" => Ok(TokenState::Mitigated),
            "resolved" => Ok(TokenState::Resolved),
            other => Err(TibetError::decode(format!("unknown token state: {other}"))),
        }
    }
}

/// Constructor input for [`Token::new`]. The four identity fields are
/// required up front; the provenance facets default to empty.
#[derive(Debug, Clone)]
pub struct TokenParams {
    pub token_id: String,
    pub action: String,
    pub timestamp: String,
    pub actor: String,
    pub erin: Value,
    pub eraan: Vec<String>,
    pub eromheen: Map<String, Value>,
    pub erachter: String,
    pub parent_id: Option<String>,
    pub state: TokenState,
}

impl TokenParams {
    pub fn new(
        token_id: impl Into<String>,
        action: impl Into<String>,
        timestamp: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        TokenParams {
            token_id: token_id.into(),
            action: action.into(),
            timestamp: timestamp.into(),
            actor: actor.into(),
            erin: Value::Null,
            eraan: Vec::new(),
            eromheen: Map::new(),
            erachter: String::new(),
            parent_id: None,
            state: TokenState::Created,
        }
    }
}

/// One immutable, hash-verified record of an action.
///
/// `content_hash` covers every semantic field below it; `signature` is an
/// opaque carry-through slot excluded from the hash and never validated
/// here — it is a placeholder for an external signing scheme, not a
/// security guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: String,
    pub action: String,
    pub timestamp: String,
    pub actor: String,

    #[serde(default)]
    pub erin: Value,
    #[serde(default)]
    pub eraan: Vec<String>,
    #[serde(default)]
    pub eromheen: Map<String, Value>,
    #[serde(default)]
    pub erachter: String,

    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub state: TokenState,

    pub content_hash: String,
    #[serde(default)]
    pub signature: Option<String>,
}

impl Token {
    /// Construct a token and compute its content hash immediately.
    ///
    /// Fails only if the payload cannot be canonically serialized (a
    /// non-finite number inside `erin`/`eromheen`).
    pub fn new(params: TokenParams) -> TibetResult<Token> {
        let mut token = Token {
            token_id: params.token_id,
            action: params.action,
            timestamp: params.timestamp,
            actor: params.actor,
            erin: params.erin,
            eraan: params.eraan,
            eromheen: params.eromheen,
            erachter: params.erachter,
            parent_id: params.parent_id,
            state: params.state,
            content_hash: String::new(),
            signature: None,
        };
        token.content_hash = token.compute_hash()?;
        Ok(token)
    }

    /// The canonical hash material: every semantic field, with
    /// `content_hash` and `signature` excluded.
    fn hash_material(&self) -> Value {
        json!({
            "token_id": self.token_id,
            "action": self.action,
            "timestamp": self.timestamp,
            "actor": self.actor,
            "erin": self.erin,
            "eraan": self.eraan,
            "eromheen": self.eromheen,
            "erachter": self.erachter,
            "parent_id": self.parent_id,
            "state": self.state.as_str(),
        })
    }

    fn compute_hash(&self) -> TibetResult<String> {
        let canonical = canonical_json(&self.hash_material())?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    /// Verify token integrity by recomputing the content hash.
    ///
    /// Pure and side-effect free. A payload that cannot be canonicalized
    /// counts as failed verification, not as an error.
    pub fn verify(&self) -> bool {
        match self.compute_hash() {
            Ok(hash) => hash == self.content_hash,
            Err(_) => false,
        }
    }

    /// Full record as a JSON value, including `content_hash` and
    /// `signature`.
    pub fn to_value(&self) -> TibetResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| TibetError::encoding(format!("token {}: {e}", self.token_id)))
    }

    /// Canonical single-line JSON encoding, used for on-disk storage and
    /// export.
    pub fn to_json(&self) -> TibetResult<String> {
        canonical_json(&self.to_value()?)
    }

    /// Decode a token from its JSON encoding.
    ///
    /// Fails with a decode error on malformed input or an unknown `state`
    /// value. Does not verify the content hash — callers decide whether to
    /// trust loaded data.
    pub fn from_json(raw: &str) -> TibetResult<Token> {
        serde_json::from_str(raw).map_err(|e| TibetError::decode_from("token record", e))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({}, actor={}, id={})",
            self.action, self.actor, self.token_id
        )
    }
}
