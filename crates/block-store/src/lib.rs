//! The digest-addressed block store.
//!
//! `BlockStore` is the single interface the tree engine is written against;
//! an in-memory map, a durable fs-indexed backend, and (in the
//! `block-exchange` crate) a façade over the network layer all implement it
//! identically, so the tree engine never knows which one it is talking to.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod durable;
mod memory;

pub use durable::DurableStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use tree_core::Digest;

/// `digest -> bytes` storage with put/get/has/delete and introspection.
///
/// All operations are asynchronous to accommodate durable backends; writes
/// are idempotent (the same digest always maps to the same bytes), so
/// concurrent `put`s of the same digest race harmlessly.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store `bytes` under `digest`. Returns `false` on a durable write
    /// error; callers treat that as
    /// best-effort and do not retry automatically.
    async fn put(&self, digest: Digest, bytes: Vec<u8>) -> bool;

    /// Retrieve the bytes stored under `digest`, or `None` on a miss or on
    /// detected corruption (a digest mismatch on read-back is treated as
    /// absence and the corrupt record is removed).
    async fn get(&self, digest: &Digest) -> Option<Vec<u8>>;

    /// Whether `digest` is present, without reading its bytes.
    async fn has(&self, digest: &Digest) -> bool;

    /// Remove `digest`. Returns `true` if a record was actually removed.
    async fn delete(&self, digest: &Digest) -> bool;

    /// Number of blocks currently stored.
    async fn count(&self) -> usize;

    /// Sum of stored (post-encryption, if applicable) byte lengths.
    async fn total_bytes(&self) -> u64;
}

#[cfg(test)]
mod contract_tests {
    //! A shared behavioral contract both backends must satisfy, exercised
    //! against each concrete implementation in their own test modules.
    use super::*;

    pub async fn put_then_get_roundtrips(store: &dyn BlockStore) {
        let bytes = b"hello world".to_vec();
        let digest = Digest::of(&bytes);
        assert!(store.put(digest, bytes.clone()).await);
        assert!(store.has(&digest).await);
        assert_eq!(store.get(&digest).await, Some(bytes));
    }

    pub async fn missing_digest_is_absent(store: &dyn BlockStore) {
        let digest = Digest::of(b"never stored");
        assert!(!store.has(&digest).await);
        assert_eq!(store.get(&digest).await, None);
    }

    pub async fn delete_removes_entry(store: &dyn BlockStore) {
        let bytes = b"to be deleted".to_vec();
        let digest = Digest::of(&bytes);
        store.put(digest, bytes).await;
        assert!(store.delete(&digest).await);
        assert!(!store.has(&digest).await);
        assert!(!store.delete(&digest).await);
    }
}
