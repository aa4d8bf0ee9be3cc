//! Error handling for the TIBET core.
//!
//! One structured error type covers every failure mode of the crate.
//! Absent data is never an error: `get` on an unknown id is `Ok(None)`,
//! an empty trace is an empty vector, and a failed integrity check is a
//! `false` — callers distinguish "no data" from "corrupt data" by the
//! return shape, not by catching errors.

use thiserror::Error;

/// Main error type for the TIBET core.
#[derive(Error, Debug)]
pub enum TibetError {
    #[error("Encoding failed: {context}")]
    Encoding { context: String },

    #[error("Decoding failed: {context}")]
    Decode {
        context: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: sled::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Shorthand for Result with TibetError, used throughout the crate.
pub type TibetResult<T> = Result<T, TibetError>;

impl TibetError {
    /// Create an encoding error
    pub fn encoding(context: impl Into<String>) -> Self {
        Self::Encoding {
            context: context.into(),
        }
    }

    /// Create a decode error without an underlying serde cause
    pub fn decode(context: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            source: None,
        }
    }

    /// Create a decode error carrying the serde cause
    pub fn decode_from(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a database error
    pub fn database(operation: impl Into<String>, source: sled::Error) -> Self {
        Self::Database {
            operation: operation.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<sled::Error> for TibetError {
    fn from(err: sled::Error) -> Self {
        TibetError::database("sled_operation", err)
    }
}
