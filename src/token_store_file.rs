//! File-based token storage (JSONL).
//!
//! One canonical JSON record per line, append-only. The log file is
//! authoritative: the in-memory index is rebuilt from it on every open,
//! so a crash between "append line" and "update index" loses nothing.
//! Persistent and audit-friendly — good for production trails.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{TibetError, TibetResult};
use crate::token::Token;
use crate::token_store::{TokenFilter, TokenStore};

/// How to treat undecodable lines while loading the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    /// A corrupted line fails the whole load. The default.
    Strict,
    /// Skip corrupted lines, warning about each one.
    Lenient,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tokens: Vec<Token>,
    index: HashMap<String, usize>,
}

impl FileStore {
    /// Open a store over the given JSONL file, rebuilding the index from
    /// it. A missing file is an empty store. Any corrupted line fails the
    /// load with a decode error — loading is fail-closed by default.
    pub fn open(path: impl AsRef<Path>) -> TibetResult<Self> {
        Self::load(path.as_ref(), LoadMode::Strict)
    }

    /// Open like [`FileStore::open`], but skip lines that fail to decode,
    /// emitting a warning per skipped line. An explicit opt-in, never the
    /// default.
    pub fn open_lenient(path: impl AsRef<Path>) -> TibetResult<Self> {
        Self::load(path.as_ref(), LoadMode::Lenient)
    }

    fn load(path: &Path, mode: LoadMode) -> TibetResult<Self> {
        let mut store = FileStore {
            path: path.to_path_buf(),
            tokens: Vec::new(),
            index: HashMap::new(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "token log does not exist yet, starting empty");
            return Ok(store);
        }

        let file = File::open(path)
            .map_err(|e| TibetError::io(format!("opening token log {}", path.display()), e))?;
        let reader = BufReader::new(file);

        for (line_no, line) in reader.lines().enumerate() {
            let line = line
                .map_err(|e| TibetError::io(format!("reading token log {}", path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }
            match Token::from_json(&line) {
                Ok(token) => {
                    store.index.insert(token.token_id.clone(), store.tokens.len());
                    store.tokens.push(token);
                }
                Err(err) => match mode {
                    LoadMode::Strict => {
                        return Err(TibetError::decode(format!(
                            "corrupted record at {}:{}: {err}",
                            path.display(),
                            line_no + 1
                        )));
                    }
                    LoadMode::Lenient => {
                        warn!(
                            path = %path.display(),
                            line = line_no + 1,
                            %err,
                            "skipping undecodable token record"
                        );
                    }
                },
            }
        }

        debug!(path = %path.display(), count = store.tokens.len(), "token log loaded");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, line: &str) -> TibetResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TibetError::io(format!("opening token log {}", self.path.display()), e))?;
        writeln!(file, "{line}")
            .map_err(|e| TibetError::io(format!("appending to {}", self.path.display()), e))
    }
}

impl TokenStore for FileStore {
    fn add(&mut self, token: Token) -> TibetResult<()> {
        // Persist first; the index only advances after a successful write,
        // keeping it consistent with the log on failure.
        let line = token.to_json()?;
        self.append_line(&line)?;

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
        warn!(path = %self.path.display(), "clearing token log (irreversible)");
        std::fs::write(&self.path, "")
            .map_err(|e| TibetError::io(format!("truncating {}", self.path.display()), e))?;
        self.tokens.clear();
        self.index.clear();
        Ok(())
    }
}
