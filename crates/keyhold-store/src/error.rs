//! Error types for store operations
//!
//! "Not found" is deliberately absent: lookups report absence as `None` or an
//! empty list, which is a normal outcome rather than a failure.

use keyhold_core::KeyError;
use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the key store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Session could not be acquired, or the store has been shut down
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Required indices could not be created; fatal at startup
    #[error("Index setup failed: {0}")]
    IndexSetupFailed(String),

    /// An add or delete did not commit
    #[error("Store write failed: {0}")]
    WriteFailed(String),

    /// A read query failed after a session was acquired
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// The store driver gave up waiting
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// A stored document could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The submitted key could not be canonicalized
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Whether the failure lies with the store rather than the submitted data
    pub fn is_store_failure(&self) -> bool {
        !matches!(self, StoreError::InvalidKey(_))
    }
}

impl From<KeyError> for StoreError {
    fn from(err: KeyError) -> Self {
        StoreError::InvalidKey(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
