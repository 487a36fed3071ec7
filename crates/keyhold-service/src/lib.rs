//! Keyhold Service
//!
//! Transport-free front end for the key store:
//! - `add` decodes submitted key text and stores each key
//! - `lookup` runs `get`, `hget`, `index` and `vindex` requests
//!
//! ## Search terms
//!
//! - `0x` + 8 hex digits: short id (may match several keys)
//! - `0x` + 16 hex digits: key id
//! - `0x` + 40 or 64 hex digits: fingerprint
//! - 32 hex digits with `hget`: content digest
//! - anything else: case-insensitive user ID substring
//!
//! A `get` whose short id matches more than one key fails with
//! [`ServiceError::AmbiguousShortId`] carrying every match, so the caller can
//! offer a choice instead of silently returning one.

pub mod dispatch;
pub mod error;
pub mod query;

pub use dispatch::{AddSummary, KeyService, LookupResponse, INDEX_CONTENT_TYPE};
pub use error::{ErrorBody, Result, ServiceError};
pub use query::{LookupOp, SearchTerm};
