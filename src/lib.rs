//! Library root for the `tibet_core` crate.
//!
//! TIBET: Token-based Intent, Behavior, Evidence & Trust — tamper-evident
//! provenance for trustworthy systems. Every recorded action becomes an
//! immutable, content-hashed token; tokens link into causal chains via
//! parent references; stores persist them append-only.
//!
//! The four provenance facets on every token:
//! - `erin`: what's IN the action (content, data)
//! - `eraan`: what's attached (dependencies, references)
//! - `eromheen`: context around it (environment, state)
//! - `erachter`: intent behind it (why this action)

// Core error handling
pub mod errors;

// Canonical serialization & integrity
pub mod canonicalize;
pub mod token;

// Storage backends
pub mod token_store;
pub mod token_store_file;
pub mod token_store_memory;
pub mod token_store_sled;

// Chain walking & verification
pub mod chain;

// Creation facade
pub mod provider;

// Configuration & CLI
pub mod cli;
pub mod config;

// Re-export the primary surface
pub use chain::{Chain, ChainSummary, TokenTree};
pub use errors::{TibetError, TibetResult};
pub use provider::{ExportFormat, IntegrityReport, Provider, TokenDraft};
pub use token::{Token, TokenParams, TokenState};
pub use token_store::{TokenFilter, TokenStore};
pub use token_store_file::FileStore;
pub use token_store_memory::MemoryStore;
pub use token_store_sled::SledStore;
