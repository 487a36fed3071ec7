//! The setup flow used by the `keyhold-store` binary
//!
//! Only the crate's entry points are imported: store methods are reached
//! through `Arc<dyn KeyStore>` without naming the traits.

use keyhold_store::{open_store, StoreConfig};

#[tokio::test]
async fn setup_flow_lists_indexes_and_shuts_down() {
    let store = open_store(&StoreConfig::default()).await.unwrap();

    let indexes = store.list_indexes().await.unwrap();
    assert_eq!(indexes.len(), keyhold_store::required_indexes().len());

    store.shutdown().await;
    let digest = "da84f40d830a7be2a3c0b7f2e146bfaa".parse().unwrap();
    assert!(store.lookup_by_digest(&digest).await.is_err());
}
