//! Configuration loading.
//!
//! Layered the usual way: compiled defaults, then `tibet.toml`, then
//! `TIBET_`-prefixed environment variables (e.g. `TIBET_ACTOR`,
//! `TIBET_STORE.BACKEND`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::errors::{TibetError, TibetResult};
use crate::token_store::TokenStore;
use crate::token_store_file::FileStore;
use crate::token_store_memory::MemoryStore;
use crate::token_store_sled::SledStore;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TibetConfig {
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default = "default_auto_chain")]
    pub auto_chain: bool,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_actor() -> String {
    "jis:tibet:cli".to_string()
}

fn default_auto_chain() -> bool {
    true
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_path() -> String {
    "data/tibet.jsonl".to_string()
}

impl Default for TibetConfig {
    fn default() -> Self {
        TibetConfig {
            actor: default_actor(),
            auto_chain: default_auto_chain(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            backend: default_backend(),
            path: default_path(),
        }
    }
}

pub fn load_config() -> Result<TibetConfig, figment::Error> {
    let figment = Figment::from(Serialized::defaults(TibetConfig::default()))
        .merge(Toml::file("tibet.toml"))
        .merge(Env::prefixed("TIBET_"));

    let config: TibetConfig = figment.extract()?;

    if config.actor.trim().is_empty() {
        return Err(figment::Error::from("actor must be set".to_string()));
    }

    Ok(config)
}

/// Map a store configuration to a concrete backend.
pub fn open_store(config: &StoreConfig) -> TibetResult<Box<dyn TokenStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Box::new(MemoryStore::new())),
        "file" => Ok(Box::new(FileStore::open(&config.path)?)),
        "sled" => Ok(Box::new(SledStore::open(&config.path)?)),
        other => Err(TibetError::config(format!(
            "unknown store backend: {other} (expected memory, file, or sled)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = TibetConfig::default();
        assert_eq!(config.store.backend, "memory");
        assert!(config.auto_chain);
        assert!(!config.actor.is_empty());
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let config = StoreConfig {
            backend: "postgres".into(),
            path: String::new(),
        };
        assert!(matches!(
            open_store(&config),
            Err(TibetError::Config { .. })
        ));
    }
}
