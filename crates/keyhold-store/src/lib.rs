//! Keyhold Store
//!
//! Deduplicating, content-addressed storage for public keys:
//! - Every key is stored under the digest of its canonical packet set
//! - Submitting the same key any number of times leaves exactly one record
//! - Records are found by digest, key id, short id, fingerprint or user ID
//!
//! ## Backends
//!
//! - [`MemoryStore`] - the default, for development and tests
//! - `PostgresStore` - behind the `postgres` feature
//!
//! Both create their indices on construction and pass the
//! [`conformance`] suite.
//!
//! ## Merging
//!
//! When a [`keyhold_core::KeyMerger`] is configured, new material for a key
//! that is already stored is folded into a single replacement record and the
//! superseded records are removed. Merging is off by default.

pub mod config;
pub mod conformance;
pub mod error;
pub mod merge;
pub mod record;
pub mod storage;

pub use config::{open_store, ConfigError, OpenError, StoreConfig};
pub use error::StoreError;
pub use merge::AddOutcome;
pub use record::KeyRecord;
pub use storage::{required_indexes, Filter, IndexManager, IndexSpec, KeyStore, MemoryStore};
#[cfg(feature = "postgres")]
pub use storage::PostgresStore;
