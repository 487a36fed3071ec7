//! Persisted key document
//!
//! One `KeyRecord` exists per distinct digest. Identifiers are computed from
//! the key when the record is built and are never changed afterwards.

use chrono::{DateTime, Utc};
use keyhold_core::{Digest, Fingerprint, KeyId, ParsedKey, ShortId};

use crate::error::{Result, StoreError};
use crate::storage::Filter;

/// Stored, deduplicated representation of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Canonical content digest (unique)
    pub digest: Digest,
    /// Primary key fingerprint
    pub fingerprint: Fingerprint,
    /// 64-bit key identifier
    pub key_id: KeyId,
    /// Low-order 32 bits of `key_id`
    pub short_id: ShortId,
    /// Serialized key, enough to rebuild the full `ParsedKey`
    pub payload: Vec<u8>,
    /// Normalized user IDs, kept alongside the payload for substring search
    pub user_ids: Vec<String>,
    /// When this digest was first stored
    pub created_at: DateTime<Utc>,
    /// When this record was last written
    pub updated_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Build the record for a submitted key
    pub fn from_key(key: &ParsedKey) -> Result<Self> {
        let digest = key.digest()?;
        let payload = key
            .to_bytes()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now();

        Ok(Self {
            digest,
            fingerprint: key.fingerprint().clone(),
            key_id: key.key_id(),
            short_id: key.short_id(),
            payload,
            user_ids: key.normalized_user_ids(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Decode the stored payload
    pub fn key(&self) -> Result<ParsedKey> {
        ParsedKey::from_bytes(&self.payload).map_err(|e| {
            StoreError::Serialization(format!("record {}: {}", self.digest, e))
        })
    }

    /// Whether this record satisfies a lookup filter
    pub fn matches(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Digest(d) => self.digest == *d,
            Filter::KeyId(id) => self.key_id == *id,
            Filter::ShortId(id) => self.short_id == *id,
            Filter::Fingerprint(fp) => self.fingerprint == *fp,
            Filter::UserIdContains(text) => {
                let needle = keyhold_core::key::normalize_user_id(text);
                self.user_ids.iter().any(|uid| uid.contains(&needle))
            }
        }
    }
}
