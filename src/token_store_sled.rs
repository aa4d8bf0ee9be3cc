//! Sled-backed token storage.
//!
//! An embedded-database backend for deployments that want crash-safe
//! storage without managing a log file directly. Records live in a `log`
//! tree keyed by a monotonically increasing sequence number, which
//! preserves insertion order and the last-write-wins index precedence;
//! an `index` tree maps `token_id` to its newest sequence.

use sled::Db;
use tracing::{debug, warn};

use crate::errors::{TibetError, TibetResult};
use crate::token::Token;
use crate::token_store::{TokenFilter, TokenStore};

const LOG_TREE: &str = "token_log";
const INDEX_TREE: &str = "token_index";

pub struct SledStore {
    db: Db,
    log: sled::Tree,
    index: sled::Tree,
    next_seq: u64,
}

impl SledStore {
    /// Open (or create) a sled database at the given path.
    pub fn open(path: &str) -> TibetResult<Self> {
        let db = sled::open(path)
            .map_err(|e| TibetError::database(format!("opening sled db at {path}"), e))?;
        let log = db.open_tree(LOG_TREE)?;
        let index = db.open_tree(INDEX_TREE)?;

        let next_seq = match log.last()? {
            Some((key, _)) => decode_seq(key.as_ref())? + 1,
            None => 0,
        };

        debug!(path, next_seq, "sled token store opened");
        Ok(SledStore {
            db,
            log,
            index,
            next_seq,
        })
    }

    fn decode_record(bytes: &[u8]) -> TibetResult<Token> {
        let raw = std::str::from_utf8(bytes)
            .map_err(|_| TibetError::decode("stored token record is not valid UTF-8"))?;
        Token::from_json(raw)
    }
}

fn decode_seq(bytes: &[u8]) -> TibetResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TibetError::decode("malformed sequence key in token log"))?;
    Ok(u64::from_be_bytes(arr))
}

impl TokenStore for SledStore {
    fn add(&mut self, token: Token) -> TibetResult<()> {
        let line = token.to_json()?;
        let seq = self.next_seq;

        self.log.insert(seq.to_be_bytes(), line.as_bytes())?;
        self.index
            .insert(token.token_id.as_bytes(), seq.to_be_bytes().to_vec())?;
        self.db.flush()?;

        self.next_seq = seq + 1;
        Ok(())
    }

    fn get(&self, token_id: &str) -> TibetResult<Option<Token>> {
        let Some(seq_bytes) = self.index.get(token_id.as_bytes())? else {
            return Ok(None);
        };
        let seq = decode_seq(seq_bytes.as_ref())?;
        match self.log.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_record(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> TibetResult<Vec<Token>> {
        let mut tokens = Vec::new();
        for entry in self.log.iter() {
            let (_, bytes) = entry?;
            tokens.push(Self::decode_record(bytes.as_ref())?);
        }
        Ok(tokens)
    }

    fn find(&self, filter: &TokenFilter) -> TibetResult<Vec<Token>> {
        Ok(filter.apply(&self.all()?))
    }

    fn count(&self) -> TibetResult<usize> {
        Ok(self.log.len())
    }

    fn clear(&mut self) -> TibetResult<()> {
        warn!("clearing sled token store (irreversible)");
        self.log.clear()?;
        self.index.clear()?;
        self.db.flush()?;
        self.next_seq = 0;
        Ok(())
    }
}
