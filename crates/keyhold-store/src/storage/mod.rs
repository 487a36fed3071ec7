//! Storage abstraction for keyhold
//!
//! This module provides a trait-based abstraction for key storage,
//! enabling both in-memory (default) and persistent (PostgreSQL) backends.
//!
//! Deduplication is the store's job, not the caller's:
//! - Each backend enforces one record per digest with a unique index (or a
//!   map keyed by digest), never with a check-then-insert sequence
//! - Every operation acquires its own session and releases it before
//!   returning, on success and error paths alike
//! - Index setup runs when the backend is constructed

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryCollection, MemorySession, MemoryStore};
#[cfg(feature = "postgres")]
pub use postgres::{PgCollection, PgSession, PostgresStore};

use async_trait::async_trait;
use keyhold_core::{Digest, Fingerprint, KeyId, ParsedKey, ShortId};
use std::fmt::Debug;

use crate::error::StoreError;
use crate::merge::AddOutcome;
use crate::record::KeyRecord;

/// Query predicate over stored records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Digest(Digest),
    KeyId(KeyId),
    ShortId(ShortId),
    Fingerprint(Fingerprint),
    /// Case-normalized substring of any user ID
    UserIdContains(String),
}

/// Description of one index on the key collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexSpec {
    pub name: String,
    pub field: String,
    pub unique: bool,
}

impl IndexSpec {
    fn new(name: &str, field: &str, unique: bool) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            unique,
        }
    }
}

/// Indices every backend must have before serving traffic
pub fn required_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("keys_digest_idx", "digest", true),
        IndexSpec::new("keys_key_id_idx", "key_id", false),
        IndexSpec::new("keys_short_id_idx", "short_id", false),
        IndexSpec::new("keys_fingerprint_idx", "fingerprint", false),
    ]
}

/// Ensures the collection's indices exist
#[async_trait]
pub trait IndexManager: Send + Sync {
    /// Create any missing required index. Safe to call repeatedly.
    async fn ensure_indexes(&self) -> Result<(), StoreError>;

    /// Indices currently present on the key collection
    async fn list_indexes(&self) -> Result<Vec<IndexSpec>, StoreError>;
}

/// Storage backend trait for key records
///
/// Implementations must be thread-safe and support concurrent access.
/// Every backend also manages its own indices.
#[async_trait]
pub trait KeyStore: IndexManager + Debug {
    // =========================================================================
    // Merge-On-Add
    // =========================================================================

    /// Store a key, deduplicating by digest
    async fn add(&self, key: &ParsedKey) -> Result<AddOutcome, StoreError>;

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Get the record with this exact digest
    async fn lookup_by_digest(&self, digest: &Digest) -> Result<Option<KeyRecord>, StoreError>;

    /// Get the most recently written record for a key id
    async fn lookup_by_key_id(&self, key_id: KeyId) -> Result<Option<KeyRecord>, StoreError>;

    /// Get every record whose short id matches; collisions are expected
    async fn lookup_by_short_id(&self, short_id: ShortId) -> Result<Vec<KeyRecord>, StoreError>;

    /// Get every record with a user ID containing `text`, ignoring case
    async fn lookup_by_user_id(&self, text: &str) -> Result<Vec<KeyRecord>, StoreError>;

    /// Get the most recently written record for a primary fingerprint
    async fn lookup_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<KeyRecord>, StoreError>;

    // =========================================================================
    // Administration
    // =========================================================================

    /// Count records matching a filter
    async fn count(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Remove a record by digest
    async fn delete(&self, digest: &Digest) -> Result<bool, StoreError>;

    /// Refuse new sessions; in-flight sessions finish normally
    async fn shutdown(&self);
}

/// Pick the newest record, breaking ties by digest
pub(crate) fn newest(records: Vec<KeyRecord>) -> Option<KeyRecord> {
    records
        .into_iter()
        .max_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.digest.cmp(&b.digest)))
}

/// Stable result order: oldest first, then by digest
pub(crate) fn sort_records(records: &mut [KeyRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.digest.cmp(&b.digest)));
}
