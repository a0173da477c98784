//! Error types for the request context crate.
//!
//! Context operations themselves never fail: conflicts surface as boolean
//! results or a log line. These errors cover the surrounding surfaces,
//! namely configuration loading and typed lookups.

use thiserror::Error;

/// The main error type for requestctx operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored entry does not have the requested payload type.
    #[error("{0}")]
    TypeMismatch(#[from] TypeMismatchError),
}

impl ContextError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Error raised when a typed lookup finds a payload of another type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Entry '{key}' is not a {expected}")]
pub struct TypeMismatchError {
    /// The key that was looked up.
    pub key: String,
    /// The requested payload type name.
    pub expected: &'static str,
}

impl TypeMismatchError {
    /// Creates a new type mismatch error.
    #[must_use]
    pub fn new(key: impl Into<String>, expected: &'static str) -> Self {
        Self {
            key: key.into(),
            expected,
        }
    }
}
