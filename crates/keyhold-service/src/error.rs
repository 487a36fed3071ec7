//! Service error types

use keyhold_store::{KeyRecord, StoreError};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to front-end callers
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A `get` by short id matched several keys; carries every match
    #[error("Short id matches {} keys", .0.len())]
    AmbiguousShortId(Vec<KeyRecord>),

    #[error("Encoding failed: {0}")]
    Codec(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error body handed back to the transport
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    /// Whether the failure is on our side (5xx) rather than the caller's
    pub fn is_server_error(&self) -> bool {
        match self {
            ServiceError::BadRequest(_)
            | ServiceError::NotFound(_)
            | ServiceError::AmbiguousShortId(_) => false,
            ServiceError::Codec(_) => true,
            ServiceError::Store(e) => e.is_store_failure(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::AmbiguousShortId(_) => "AMBIGUOUS_SHORT_ID",
            ServiceError::Codec(_) => "INTERNAL_ERROR",
            ServiceError::Store(StoreError::InvalidKey(_)) => "BAD_REQUEST",
            ServiceError::Store(StoreError::Timeout(_)) => "TIMEOUT",
            ServiceError::Store(StoreError::Unavailable(_)) => "UNAVAILABLE",
            ServiceError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            ServiceError::AmbiguousShortId(records) => Some(serde_json::json!({
                "fingerprints": records
                    .iter()
                    .map(|r| r.fingerprint.to_string())
                    .collect::<Vec<_>>(),
            })),
            _ => None,
        };

        ErrorBody {
            error: self.to_string(),
            code: self.code(),
            details,
        }
    }
}
