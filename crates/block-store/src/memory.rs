//! An in-memory [`BlockStore`](crate::BlockStore), backed by a concurrent map.
//!
//! Used by tests, by single-process deployments that don't need durability,
//! and as the "local" layer a `block-exchange` façade falls back to before
//! asking the network.

use async_trait::async_trait;
use dashmap::DashMap;
use tree_core::Digest;

use crate::BlockStore;

/// `BlockStore` over a [`DashMap`], with no persistence across process restarts.
#[derive(Default)]
pub struct MemoryStore {
    blocks: DashMap<Digest, Vec<u8>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put(&self, digest: Digest, bytes: Vec<u8>) -> bool {
        self.blocks.insert(digest, bytes);
        true
    }

    async fn get(&self, digest: &Digest) -> Option<Vec<u8>> {
        self.blocks.get(digest).map(|entry| entry.value().clone())
    }

    async fn has(&self, digest: &Digest) -> bool {
        self.blocks.contains_key(digest)
    }

    async fn delete(&self, digest: &Digest) -> bool {
        self.blocks.remove(digest).is_some()
    }

    async fn count(&self) -> usize {
        self.blocks.len()
    }

    async fn total_bytes(&self) -> u64 {
        self.blocks.iter().map(|entry| entry.value().len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests;

    #[tokio::test]
    async fn satisfies_contract() {
        let store = MemoryStore::new();
        contract_tests::put_then_get_roundtrips(&store).await;
        let store = MemoryStore::new();
        contract_tests::missing_digest_is_absent(&store).await;
        let store = MemoryStore::new();
        contract_tests::delete_removes_entry(&store).await;
    }

    #[tokio::test]
    async fn tracks_count_and_total_bytes() {
        let store = MemoryStore::new();
        let a = b"aaaa".to_vec();
        let b = b"bb".to_vec();
        store.put(Digest::of(&a), a.clone()).await;
        store.put(Digest::of(&b), b.clone()).await;
        assert_eq!(store.count().await, 2);
        assert_eq!(store.total_bytes().await, (a.len() + b.len()) as u64);
    }

    #[tokio::test]
    async fn put_is_idempotent_on_same_digest() {
        let store = MemoryStore::new();
        let bytes = b"same content".to_vec();
        let digest = Digest::of(&bytes);
        store.put(digest, bytes.clone()).await;
        store.put(digest, bytes).await;
        assert_eq!(store.count().await, 1);
    }
}
