//! Error types for the caching layer
//!
//! The cache and the deduplicator never fail on their own during normal
//! operation. Errors here cover the two places where something can go wrong
//! around them: turning caller parameters into a canonical key, and loading
//! configuration. Transport failures belong to the caller; [`TransportError`]
//! is a ready-made cloneable type for callers that do not bring their own.

use thiserror::Error;

/// Main error type for cache and configuration operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Parameters could not be serialized into a canonical object
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration or unparseable environment value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

/// Failure reported by the network layer.
///
/// Every waiter on a deduplicated call receives a clone of the same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Backend answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The transport gave up waiting for a response
    #[error("Request timeout")]
    Timeout,

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),
}
