//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development, tests and single-instance deployments.
//! Data is lost on restart.
//!
//! The collection lock plays the role a database's atomic upsert plays for
//! the Postgres backend: every write, including a full merge, happens inside
//! one write section, so readers see either the old or the new state.

use async_trait::async_trait;
use keyhold_core::{Digest, Fingerprint, KeyId, KeyMerger, ParsedKey, ShortId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::{newest, required_indexes, sort_records, Filter, IndexManager, IndexSpec, KeyStore};
use crate::error::{Result, StoreError};
use crate::merge::{plan_merge, AddOutcome, MergePlan};
use crate::record::KeyRecord;

fn merge_target_taken(digest: &Digest) -> StoreError {
    StoreError::WriteFailed(format!(
        "merged digest {digest} is already held by a record for another fingerprint"
    ))
}

/// Key documents plus their secondary indices
#[derive(Debug, Default)]
struct Collection {
    /// Primary storage; the map key is the unique digest index
    docs: HashMap<Digest, KeyRecord>,
    /// Secondary indices: field -> value -> digests
    secondary: BTreeMap<String, HashMap<String, BTreeSet<Digest>>>,
    /// Declared index specs
    indexes: BTreeSet<IndexSpec>,
}

fn field_value(record: &KeyRecord, field: &str) -> Option<String> {
    match field {
        "key_id" => Some(record.key_id.to_string()),
        "short_id" => Some(record.short_id.to_string()),
        "fingerprint" => Some(record.fingerprint.to_string()),
        _ => None,
    }
}

impl Collection {
    fn ensure_index(&mut self, spec: IndexSpec) -> bool {
        if self.indexes.contains(&spec) {
            return false;
        }

        if !spec.unique {
            let mut entries: HashMap<String, BTreeSet<Digest>> = HashMap::new();
            for record in self.docs.values() {
                if let Some(value) = field_value(record, &spec.field) {
                    entries.entry(value).or_default().insert(record.digest);
                }
            }
            self.secondary.insert(spec.field.clone(), entries);
        }

        self.indexes.insert(spec);
        true
    }

    fn insert(&mut self, record: KeyRecord) {
        for (field, entries) in self.secondary.iter_mut() {
            if let Some(value) = field_value(&record, field) {
                entries.entry(value).or_default().insert(record.digest);
            }
        }
        self.docs.insert(record.digest, record);
    }

    fn remove(&mut self, digest: &Digest) -> Option<KeyRecord> {
        let record = self.docs.remove(digest)?;
        for (field, entries) in self.secondary.iter_mut() {
            if let Some(value) = field_value(&record, field) {
                if let Some(set) = entries.get_mut(&value) {
                    set.remove(digest);
                    if set.is_empty() {
                        entries.remove(&value);
                    }
                }
            }
        }
        Some(record)
    }

    fn by_index(&self, field: &str, value: String) -> Result<Vec<KeyRecord>> {
        let entries = self.secondary.get(field).ok_or_else(|| {
            StoreError::QueryFailed(format!("no index on {}; refusing to scan", field))
        })?;

        Ok(entries
            .get(&value)
            .map(|digests| {
                digests
                    .iter()
                    .filter_map(|d| self.docs.get(d).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find(&self, filter: &Filter) -> Result<Vec<KeyRecord>> {
        let mut records: Vec<KeyRecord> = match filter {
            Filter::Digest(d) => self.docs.get(d).cloned().into_iter().collect(),
            Filter::KeyId(id) => self.by_index("key_id", id.to_string())?,
            Filter::ShortId(id) => self.by_index("short_id", id.to_string())?,
            Filter::Fingerprint(fp) => self.by_index("fingerprint", fp.to_string())?,
            Filter::UserIdContains(_) => self
                .docs
                .values()
                .filter(|r| r.matches(filter))
                .cloned()
                .collect(),
        };
        sort_records(&mut records);
        Ok(records)
    }
}

/// A session on the in-memory store
///
/// Dropping the session releases it; `close` does the same explicitly and may
/// be called any number of times.
#[derive(Debug)]
pub struct MemorySession {
    collection: Option<Arc<RwLock<Collection>>>,
    active: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySession {
    /// Handle to the key collection
    pub fn collection(&self) -> Result<MemoryCollection<'_>> {
        let inner = self
            .collection
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("session already closed".into()))?;
        Ok(MemoryCollection {
            inner,
            fail_writes: &self.fail_writes,
        })
    }

    /// Release the session
    pub fn close(&mut self) {
        if self.collection.take().is_some() {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.collection.is_none()
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Collection handle borrowed from a `MemorySession`
#[derive(Debug)]
pub struct MemoryCollection<'s> {
    inner: &'s RwLock<Collection>,
    fail_writes: &'s AtomicBool,
}

impl<'s> MemoryCollection<'s> {
    fn read(&self) -> Result<RwLockReadGuard<'s, Collection>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("collection lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'s, Collection>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("write rejected by store".into()));
        }
        self.inner
            .write()
            .map_err(|_| StoreError::WriteFailed("collection lock poisoned".into()))
    }

    pub fn find(&self, filter: &Filter) -> Result<Vec<KeyRecord>> {
        self.read()?.find(filter)
    }

    pub fn count(&self, filter: &Filter) -> Result<u64> {
        Ok(self.find(filter)?.len() as u64)
    }

    /// Insert unless a record with the same digest exists
    pub fn insert_if_absent(&self, record: KeyRecord) -> Result<AddOutcome> {
        let mut collection = self.write()?;
        let digest = record.digest;
        if collection.docs.contains_key(&digest) {
            return Ok(AddOutcome::Unchanged(digest));
        }
        collection.insert(record);
        Ok(AddOutcome::Inserted(digest))
    }

    /// Merge `key` into the records stored for its fingerprint
    pub fn merge_insert(&self, key: &ParsedKey, merger: &dyn KeyMerger) -> Result<AddOutcome> {
        let mut collection = self.write()?;
        let existing = collection.find(&Filter::Fingerprint(key.fingerprint().clone()))?;

        match plan_merge(&existing, key, merger)? {
            MergePlan::Unchanged(digest) => Ok(AddOutcome::Unchanged(digest)),
            MergePlan::Replace { record, superseded } => {
                let digest = record.digest;
                // Nothing is removed unless the merged record can be written
                if collection.docs.contains_key(&digest)
                    && !existing.iter().any(|r| r.digest == digest)
                {
                    return Err(merge_target_taken(&digest));
                }
                for old in &superseded {
                    collection.remove(old);
                }
                if !collection.docs.contains_key(&digest) {
                    collection.insert(record);
                }
                if superseded.is_empty() {
                    Ok(AddOutcome::Inserted(digest))
                } else {
                    Ok(AddOutcome::Merged { digest, superseded })
                }
            }
        }
    }

    pub fn remove(&self, digest: &Digest) -> Result<bool> {
        Ok(self.write()?.remove(digest).is_some())
    }

    /// Returns the number of indices created
    pub fn ensure_indexes(&self) -> Result<usize> {
        let mut collection = self
            .inner
            .write()
            .map_err(|_| StoreError::IndexSetupFailed("collection lock poisoned".into()))?;
        Ok(required_indexes()
            .into_iter()
            .filter(|spec| collection.ensure_index(spec.clone()))
            .count())
    }

    pub fn list_indexes(&self) -> Result<Vec<IndexSpec>> {
        Ok(self.read()?.indexes.iter().cloned().collect())
    }
}

/// In-memory key store implementation
#[derive(Debug)]
pub struct MemoryStore {
    collection: Arc<RwLock<Collection>>,
    merger: Option<Arc<dyn KeyMerger>>,
    open: AtomicBool,
    active_sessions: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create a new in-memory store with its indices in place
    pub fn new() -> Self {
        let mut collection = Collection::default();
        for spec in required_indexes() {
            collection.ensure_index(spec);
        }

        Self {
            collection: Arc::new(RwLock::new(collection)),
            merger: None,
            open: AtomicBool::new(true),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a store that merges new material into keys with the same
    /// primary fingerprint
    pub fn with_merger(merger: Arc<dyn KeyMerger>) -> Self {
        Self {
            merger: Some(merger),
            ..Self::new()
        }
    }

    /// Acquire a session
    pub fn session(&self) -> Result<MemorySession> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store has been shut down".into()));
        }
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            collection: Some(Arc::clone(&self.collection)),
            active: Arc::clone(&self.active_sessions),
            fail_writes: Arc::clone(&self.fail_writes),
        })
    }

    /// Number of sessions not yet released
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with `WriteFailed`
    #[cfg(any(test, feature = "testutil"))]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn find(&self, filter: &Filter) -> Result<Vec<KeyRecord>> {
        let mut session = self.session()?;
        let result = session.collection()?.find(filter);
        session.close();
        result
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexManager for MemoryStore {
    async fn ensure_indexes(&self) -> Result<()> {
        let mut session = self.session()?;
        let created = session.collection()?.ensure_indexes()?;
        session.close();
        debug!(created, "Ensured in-memory indexes");
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<IndexSpec>> {
        let mut session = self.session()?;
        let indexes = session.collection()?.list_indexes();
        session.close();
        indexes
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    // =========================================================================
    // Merge-On-Add
    // =========================================================================

    async fn add(&self, key: &ParsedKey) -> Result<AddOutcome> {
        let mut session = self.session()?;
        let collection = session.collection()?;

        let result = match &self.merger {
            None => collection.insert_if_absent(KeyRecord::from_key(key)?),
            Some(merger) => collection.merge_insert(key, merger.as_ref()),
        };
        session.close();

        match &result {
            Ok(AddOutcome::Inserted(digest)) => {
                info!(digest = %digest, key_id = %key.key_id(), "Stored new key");
            }
            Ok(AddOutcome::Unchanged(digest)) => {
                debug!(digest = %digest, "Key already stored");
            }
            Ok(AddOutcome::Merged { digest, superseded }) => {
                info!(
                    digest = %digest,
                    key_id = %key.key_id(),
                    superseded = superseded.len(),
                    "Merged key material"
                );
            }
            Err(e) => {
                warn!(key_id = %key.key_id(), error = %e, "Failed to store key");
            }
        }
        result
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    async fn lookup_by_digest(&self, digest: &Digest) -> Result<Option<KeyRecord>> {
        Ok(self.find(&Filter::Digest(*digest))?.into_iter().next())
    }

    async fn lookup_by_key_id(&self, key_id: KeyId) -> Result<Option<KeyRecord>> {
        Ok(newest(self.find(&Filter::KeyId(key_id))?))
    }

    async fn lookup_by_short_id(&self, short_id: ShortId) -> Result<Vec<KeyRecord>> {
        self.find(&Filter::ShortId(short_id))
    }

    async fn lookup_by_user_id(&self, text: &str) -> Result<Vec<KeyRecord>> {
        self.find(&Filter::UserIdContains(text.to_string()))
    }

    async fn lookup_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<KeyRecord>> {
        Ok(newest(self.find(&Filter::Fingerprint(fingerprint.clone()))?))
    }

    // =========================================================================
    // Administration
    // =========================================================================

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let mut session = self.session()?;
        let count = session.collection()?.count(filter);
        session.close();
        count
    }

    async fn delete(&self, digest: &Digest) -> Result<bool> {
        let mut session = self.session()?;
        let removed = session.collection()?.remove(digest);
        session.close();
        if let Ok(true) = removed {
            info!(digest = %digest, "Deleted key");
        }
        removed
    }

    async fn shutdown(&self) {
        self.open.store(false, Ordering::SeqCst);
        info!("In-memory key store shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyhold_core::{testutil, PacketUnionMerger};

    fn jenny_digest() -> Digest {
        testutil::JENNY_DIGEST.parse().unwrap()
    }

    #[tokio::test]
    async fn test_add_then_lookup() {
        let store = MemoryStore::new();
        let key = testutil::jenny_ondioline();

        assert!(store.lookup_by_digest(&jenny_digest()).await.unwrap().is_none());

        let outcome = store.add(&key).await.unwrap();
        assert_eq!(outcome, AddOutcome::Inserted(jenny_digest()));

        let record = store.lookup_by_digest(&jenny_digest()).await.unwrap().unwrap();
        assert_eq!(record.key().unwrap(), key);
    }

    #[tokio::test]
    async fn test_repeated_add_is_noop() {
        let store = MemoryStore::new();
        let key = testutil::jenny_ondioline();

        assert!(store.add(&key).await.unwrap().inserted());
        let first = store.lookup_by_digest(&jenny_digest()).await.unwrap().unwrap();

        for _ in 0..9 {
            assert!(!store.add(&key).await.unwrap().inserted());
        }

        let filter = Filter::Digest(jenny_digest());
        assert_eq!(store.count(&filter).await.unwrap(), 1);

        let last = store.lookup_by_digest(&jenny_digest()).await.unwrap().unwrap();
        assert_eq!(first, last);
    }

    #[tokio::test]
    async fn test_session_close_is_idempotent() {
        let store = MemoryStore::new();
        let mut session = store.session().unwrap();
        assert_eq!(store.active_sessions(), 1);

        session.close();
        session.close();
        assert_eq!(store.active_sessions(), 0);
        assert!(session.is_closed());
        assert!(matches!(
            session.collection(),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_session_is_released() {
        let store = MemoryStore::new();
        {
            let _session = store.session().unwrap();
            assert_eq!(store.active_sessions(), 1);
        }
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_sessions_released_on_error_path() {
        let store = MemoryStore::new();
        store.fail_writes(true);

        let result = store.add(&testutil::jenny_ondioline()).await;
        assert!(matches!(result, Err(StoreError::WriteFailed(_))));
        assert_eq!(store.active_sessions(), 0);

        // No partial record is visible
        store.fail_writes(false);
        assert!(store.lookup_by_digest(&jenny_digest()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_sessions() {
        let store = MemoryStore::new();
        store.shutdown().await;

        assert!(matches!(store.session(), Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.lookup_by_digest(&jenny_digest()).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_secondary_indexes_track_removal() {
        let store = MemoryStore::new();
        let key = testutil::jenny_ondioline();
        store.add(&key).await.unwrap();

        assert_eq!(store.lookup_by_short_id(key.short_id()).await.unwrap().len(), 1);
        assert!(store.delete(&jenny_digest()).await.unwrap());
        assert!(!store.delete(&jenny_digest()).await.unwrap());
        assert!(store.lookup_by_short_id(key.short_id()).await.unwrap().is_empty());
        assert!(store.lookup_by_key_id(key.key_id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_index_backfill() {
        let mut collection = Collection::default();
        let record = KeyRecord::from_key(&testutil::jenny_ondioline()).unwrap();
        let short_id = record.short_id;
        collection.insert(record);

        assert!(collection.find(&Filter::ShortId(short_id)).is_err());

        for spec in required_indexes() {
            collection.ensure_index(spec);
        }
        assert_eq!(collection.find(&Filter::ShortId(short_id)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_supersedes_record() {
        let store = MemoryStore::with_merger(Arc::new(PacketUnionMerger));
        let key = testutil::jenny_ondioline();
        store.add(&key).await.unwrap();

        let outcome = store.add(&testutil::jenny_ondioline_update()).await.unwrap();
        let merged: Digest = testutil::JENNY_MERGED_DIGEST.parse().unwrap();
        assert_eq!(
            outcome,
            AddOutcome::Merged {
                digest: merged,
                superseded: vec![jenny_digest()]
            }
        );

        assert!(store.lookup_by_digest(&jenny_digest()).await.unwrap().is_none());
        assert_eq!(
            store.count(&Filter::Fingerprint(key.fingerprint().clone())).await.unwrap(),
            1
        );

        let record = store.lookup_by_key_id(key.key_id()).await.unwrap().unwrap();
        assert_eq!(record.digest, merged);
        assert_eq!(record.key().unwrap().user_ids().len(), 2);

        // Re-submitting the original material is now a no-op
        assert!(!store.add(&key).await.unwrap().inserted());
    }

    #[tokio::test]
    async fn test_without_merger_related_keys_coexist() {
        let store = MemoryStore::new();
        let key = testutil::jenny_ondioline();
        store.add(&key).await.unwrap();
        store.add(&testutil::jenny_ondioline_update()).await.unwrap();

        assert_eq!(
            store.count(&Filter::KeyId(key.key_id())).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_merge_into_foreign_digest_keeps_existing_records() {
        let store = MemoryStore::with_merger(Arc::new(PacketUnionMerger));
        let base = testutil::jenny_ondioline();
        let update = testutil::jenny_ondioline_update();
        let merged = PacketUnionMerger.merge(&base, &update).unwrap();

        // A record holding the merged digest under someone else's identity
        let (other, _) = testutil::short_id_twins();
        let mut forged = KeyRecord::from_key(&merged).unwrap();
        forged.fingerprint = other.fingerprint().clone();
        forged.key_id = other.key_id();
        forged.short_id = other.short_id();
        store.session().unwrap().collection().unwrap().insert_if_absent(forged).unwrap();

        assert!(store.add(&base).await.unwrap().inserted());
        let result = store.add(&update).await;
        assert!(matches!(result, Err(StoreError::WriteFailed(_))), "{result:?}");

        let kept = store.lookup_by_digest(&jenny_digest()).await.unwrap();
        assert!(kept.is_some(), "superseded record must survive a failed merge");
        assert_eq!(
            store.count(&Filter::Fingerprint(base.fingerprint().clone())).await.unwrap(),
            1
        );
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_merges_converge() {
        let store = Arc::new(MemoryStore::with_merger(Arc::new(PacketUnionMerger)));
        let base = testutil::jenny_ondioline();
        let update = testutil::jenny_ondioline_update();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                let key = if i % 2 == 0 { base.clone() } else { update.clone() };
                tokio::spawn(async move { store.add(&key).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.find(&Filter::Fingerprint(base.fingerprint().clone())).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].digest.to_string(), testutil::JENNY_MERGED_DIGEST);
    }
}
