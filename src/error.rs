//! Error types shared by the tree, the transformers and the engine.

use std::io;

use thiserror::Error;

/// Errors raised by [`Tree`](crate::Tree) addressing.
///
/// `StructuralConflict` and `RootWriteConflict` indicate an authoring or
/// programming error and are never recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    /// Reading a keychain that does not exist.
    #[error("keychain not found: '{keychain}'")]
    NotFound { keychain: String },

    /// Writing through a non-mapping node where a mapping is required.
    #[error("cannot write through {found} at '{keychain}'")]
    StructuralConflict { keychain: String, found: &'static str },

    /// Replacing the root mapping with a non-mapping value.
    #[error("cannot replace the root mapping with {found}")]
    RootWriteConflict { found: &'static str },
}

impl TreeError {
    pub fn not_found(keychain: impl ToString) -> Self {
        TreeError::NotFound {
            keychain: keychain.to_string(),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A recognised token that cannot be resolved yet. Transformers recover
    /// from this by leaving the token in place for a later pass.
    #[error("cannot resolve '{token}': {reason}")]
    TokenResolution { token: String, reason: String },

    /// Malformed condition expression.
    #[error("invalid condition '{text}': {message}")]
    Condition { text: String, message: String },

    /// Unknown dynamic-invocation name.
    #[error("no invocation registered under '{name}'")]
    Lookup { name: String },

    /// A registered invocation handler failed.
    #[error("invocation '{name}' failed: {message}")]
    Invocation { name: String, message: String },

    /// Invalid or duplicate registry entry.
    #[error("registration error: {message}")]
    Registration { message: String },

    /// More than one coercion rule matched a key.
    #[error("key '{key}' matches more than one coercion rule: {}", rules.join(", "))]
    AmbiguousCoercion { key: String, rules: Vec<String> },

    /// A coercion handler rejected a value.
    #[error("cannot coerce '{key}': {message}")]
    Coercion { key: String, message: String },

    #[error("cannot import '{path}': {message}")]
    Import { path: String, message: String },

    #[error("unknown transformer '{name}'")]
    UnknownTransformer { name: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unresolved(token: impl ToString, reason: impl ToString) -> Self {
        Error::TokenResolution {
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors a transformer should swallow and retry on a later pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TokenResolution { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
