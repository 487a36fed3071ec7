//! Conformance test suite for [`KeyStore`] implementations.
//!
//! Every backend, in-memory or database-backed, can run the same suite to
//! check that it honors the store contract: one record per digest, absence
//! reported as `None`, idempotent index setup, and so on.
//!
//! # Usage
//!
//! Call each conformance function with a fresh, empty store:
//!
//! ```no_run
//! use keyhold_store::{conformance, MemoryStore};
//!
//! #[tokio::test]
//! async fn repeated_adds_store_one_record() {
//!     conformance::repeated_adds_store_one_record(&MemoryStore::new()).await;
//! }
//! ```

use keyhold_core::{Digest, KeyMerger, ParsedKey, PacketUnionMerger};
use std::sync::Arc;

use crate::storage::{required_indexes, Filter, IndexManager, KeyStore};

/// A v4 key with its own primary key material, distinct per `seed`
pub fn sample_key(seed: u8, user_id: &str) -> ParsedKey {
    let mut primary = vec![0x04, 0xc0, 0xf0, seed, 0x5e, 0xed];
    primary.extend(std::iter::repeat(seed).take(24));

    ParsedKey::builder()
        .primary_key(primary)
        .user_id(user_id)
        .signature(vec![0x04, 0x13, seed])
        .build()
        .expect("sample key is valid")
}

/// Two different v4 keys whose short ids are both `25e0f2de`
pub fn colliding_keys() -> (ParsedKey, ParsedKey) {
    let twin = |counter: u64, user_id: &str| {
        let mut primary = vec![0x04, 0x5e, 0x10, 0x00, 0xb2, 0x16];
        primary.extend([0xb2; 24]);
        primary.extend_from_slice(&counter.to_be_bytes());
        ParsedKey::builder()
            .primary_key(primary)
            .user_id(user_id)
            .build()
            .expect("colliding key is valid")
    };
    (
        twin(0xf09b, "Alpha <alpha@example.com>"),
        twin(0xf926, "Beta <beta@example.com>"),
    )
}

/// One primary key submitted as two different packet sets
fn split_key(seed: u8) -> (ParsedKey, ParsedKey) {
    let base = sample_key(seed, "Split <split@example.com>");
    let primary = base.packets()[0].clone();
    let update = ParsedKey::builder()
        .packet(primary)
        .user_id("Split Again <split-again@example.com>")
        .signature(vec![0x04, 0x13, seed, 0x02])
        .build()
        .expect("update key is valid");
    (base, update)
}

fn digest_of(key: &ParsedKey) -> Digest {
    key.digest().expect("sample key hashes")
}

// ============================================================================
// Lookup before add
// ============================================================================

/// Looking up an absent digest yields `None`, not an error.
pub async fn lookup_before_add_is_none<S: KeyStore>(store: &S) {
    let digest: Digest = "da84f40d830a7be2a3c0b7f2e146bfaa".parse().expect("valid digest");
    let result = store.lookup_by_digest(&digest).await;
    assert!(result.is_ok(), "lookup of absent digest should not error: {result:?}");
    assert!(result.expect("checked above").is_none());

    let key = sample_key(1, "Nobody <nobody@example.com>");
    assert!(store.lookup_by_key_id(key.key_id()).await.expect("lookup").is_none());
    assert!(store.lookup_by_short_id(key.short_id()).await.expect("lookup").is_empty());
    assert!(store.lookup_by_user_id("nobody").await.expect("lookup").is_empty());
}

// ============================================================================
// Add and dedup
// ============================================================================

/// A stored record decodes back to the submitted key.
pub async fn add_then_lookup_by_digest_roundtrips<S: KeyStore>(store: &S) {
    let key = sample_key(2, "Round Trip <rt@example.com>");
    let outcome = store.add(&key).await.expect("add");
    assert!(outcome.inserted(), "first add must insert");
    assert_eq!(*outcome.digest(), digest_of(&key));

    let record = store
        .lookup_by_digest(&digest_of(&key))
        .await
        .expect("lookup")
        .expect("record present after add");
    assert_eq!(record.key_id, key.key_id());
    assert_eq!(record.short_id, key.short_id());
    assert_eq!(record.key().expect("payload decodes"), key);
}

/// Ten identical submissions leave exactly one record.
pub async fn repeated_adds_store_one_record<S: KeyStore>(store: &S) {
    let key = sample_key(3, "Repeat <repeat@example.com>");
    let filter = Filter::Digest(digest_of(&key));

    assert!(store.add(&key).await.expect("first add").inserted());
    for i in 1..10 {
        let outcome = store.add(&key).await.expect("repeat add");
        assert!(!outcome.inserted(), "submission {i} must not insert again");
    }

    assert_eq!(store.count(&filter).await.expect("count"), 1);
}

/// Concurrent identical submissions leave exactly one record, and exactly
/// one caller observes the insert.
pub async fn concurrent_adds_store_one_record<S: KeyStore + 'static>(store: Arc<S>) {
    let key = sample_key(4, "Race <race@example.com>");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move { store.add(&key).await })
        })
        .collect();

    let mut inserted = 0;
    for handle in handles {
        let outcome = handle.await.expect("task").expect("add");
        if outcome.inserted() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1, "exactly one concurrent add may insert");
    assert_eq!(
        store.count(&Filter::Digest(digest_of(&key))).await.expect("count"),
        1
    );
}

/// Concurrent submissions of two packet sets for one primary key, against a
/// store that merges, converge on one record holding the union.
pub async fn concurrent_merges_store_one_record<S: KeyStore + 'static>(store: Arc<S>) {
    let (base, update) = split_key(12);
    let expected = PacketUnionMerger
        .merge(&base, &update)
        .expect("same primary key merges");

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let key = if i % 2 == 0 { base.clone() } else { update.clone() };
            tokio::spawn(async move { store.add(&key).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task").expect("add");
    }

    let filter = Filter::Fingerprint(base.fingerprint().clone());
    assert_eq!(store.count(&filter).await.expect("count"), 1);
    let record = store
        .lookup_by_fingerprint(base.fingerprint())
        .await
        .expect("lookup")
        .expect("merged record present");
    assert_eq!(record.digest, digest_of(&expected));
    assert_eq!(record.key().expect("payload decodes").user_ids().len(), 2);
}

/// Packets rebuilt from scratch carry the same identity: the re-add is a
/// no-op and every identifier finds the one record.
pub async fn identical_packets_share_identity<S: KeyStore>(store: &S) {
    let key = sample_key(13, "Same <same@example.com>");
    let rebuilt = ParsedKey::new(key.packets().to_vec()).expect("rebuilt key is valid");

    assert!(store.add(&key).await.expect("add").inserted());
    let outcome = store.add(&rebuilt).await.expect("re-add");
    assert!(!outcome.inserted());
    assert_eq!(*outcome.digest(), digest_of(&key));

    let record = store
        .lookup_by_key_id(rebuilt.key_id())
        .await
        .expect("lookup")
        .expect("record present");
    assert_eq!(record.fingerprint, *key.fingerprint());
    assert_eq!(
        store.count(&Filter::Fingerprint(key.fingerprint().clone())).await.expect("count"),
        1
    );
}

// ============================================================================
// Lookup engine
// ============================================================================

/// Key id lookup finds the stored record.
pub async fn lookup_by_key_id_finds_record<S: KeyStore>(store: &S) {
    let key = sample_key(5, "Key Id <kid@example.com>");
    store.add(&key).await.expect("add");

    let record = store
        .lookup_by_key_id(key.key_id())
        .await
        .expect("lookup")
        .expect("record present");
    assert_eq!(record.digest, digest_of(&key));

    let by_fp = store
        .lookup_by_fingerprint(key.fingerprint())
        .await
        .expect("lookup")
        .expect("record present");
    assert_eq!(by_fp.digest, digest_of(&key));
}

/// Colliding short ids return every match.
pub async fn short_id_collisions_return_all<S: KeyStore>(store: &S) {
    let (a, b) = colliding_keys();
    assert_ne!(a.key_id(), b.key_id());
    assert_eq!(a.short_id(), b.short_id());

    store.add(&a).await.expect("add a");
    store.add(&b).await.expect("add b");

    let records = store.lookup_by_short_id(a.short_id()).await.expect("lookup");
    let mut digests: Vec<_> = records.iter().map(|r| r.digest).collect();
    digests.sort();
    let mut expected = vec![digest_of(&a), digest_of(&b)];
    expected.sort();
    assert_eq!(digests, expected);
}

/// User id search is a case-insensitive substring match.
pub async fn user_id_substring_is_case_insensitive<S: KeyStore>(store: &S) {
    let key = sample_key(8, "Grace Hopper <grace@navy.example>");
    let other = sample_key(9, "Ada Lovelace <ada@example.com>");
    store.add(&key).await.expect("add");
    store.add(&other).await.expect("add");

    for term in ["grace", "HOPPER", "navy.example", "  Grace Hop "] {
        let records = store.lookup_by_user_id(term).await.expect("lookup");
        assert_eq!(records.len(), 1, "term {term:?} should match one key");
        assert_eq!(records[0].digest, digest_of(&key));
    }

    assert_eq!(store.lookup_by_user_id("example").await.expect("lookup").len(), 2);
    assert!(store.lookup_by_user_id("babbage").await.expect("lookup").is_empty());
}

/// Lookups never change stored state.
pub async fn lookups_do_not_mutate<S: KeyStore>(store: &S) {
    let key = sample_key(10, "Reader <reader@example.com>");
    store.add(&key).await.expect("add");
    let before = store
        .lookup_by_digest(&digest_of(&key))
        .await
        .expect("lookup")
        .expect("present");

    for _ in 0..3 {
        store.lookup_by_key_id(key.key_id()).await.expect("lookup");
        store.lookup_by_short_id(key.short_id()).await.expect("lookup");
        store.lookup_by_user_id("reader").await.expect("lookup");
    }

    let after = store
        .lookup_by_digest(&digest_of(&key))
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(before, after);
    assert_eq!(store.count(&Filter::KeyId(key.key_id())).await.expect("count"), 1);
}

// ============================================================================
// Administration
// ============================================================================

/// Delete removes the record from every lookup path.
pub async fn delete_removes_record<S: KeyStore>(store: &S) {
    let key = sample_key(11, "Gone <gone@example.com>");
    store.add(&key).await.expect("add");

    assert!(store.delete(&digest_of(&key)).await.expect("delete"));
    assert!(!store.delete(&digest_of(&key)).await.expect("second delete"));
    assert!(store.lookup_by_digest(&digest_of(&key)).await.expect("lookup").is_none());
    assert!(store.lookup_by_short_id(key.short_id()).await.expect("lookup").is_empty());

    // Re-adding after delete stores it again
    assert!(store.add(&key).await.expect("re-add").inserted());
}

/// Running index setup again creates nothing new and does not fail.
pub async fn ensure_indexes_is_idempotent<S: IndexManager>(store: &S) {
    store.ensure_indexes().await.expect("first ensure");
    let first = store.list_indexes().await.expect("list");
    store.ensure_indexes().await.expect("second ensure");
    let second = store.list_indexes().await.expect("list");

    assert_eq!(first, second, "ensure_indexes must not add duplicates");
    for required in required_indexes() {
        let present = second
            .iter()
            .filter(|i| i.field == required.field && i.unique == required.unique)
            .count();
        assert_eq!(present, 1, "index on {} missing or duplicated", required.field);
    }
}
