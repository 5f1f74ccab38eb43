//! A [`BlockStore`] implementation that is actually a local store backed by
//! the network: misses fall through to [`ExchangeCoordinator::get`], and
//! puts are pushed out to interested peers after landing locally.
//!
//! This is the seam the tree engine in `hash-tree` is built against when a
//! caller wants transparent peer-backed fetch instead of a bare local store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use block_store::BlockStore;
use exchange::ExchangeCoordinator;
use tree_core::Digest;

/// Combines a local store with an [`ExchangeCoordinator`] behind one
/// [`BlockStore`] interface.
///
/// `has`/`delete`/`count`/`total_bytes` only ever consult the local store —
/// there is no network equivalent of "does some peer have this," only
/// "can I fetch it," which is what `get` already does.
pub struct BlockExchange {
    local_store: Arc<dyn BlockStore>,
    coordinator: Arc<ExchangeCoordinator>,
}

impl BlockExchange {
    /// Build a façade over `local_store` and `coordinator`. `local_store`
    /// must be the same store the coordinator itself writes through to,
    /// or `get` and `has` will disagree about what is actually local.
    #[must_use]
    pub fn new(local_store: Arc<dyn BlockStore>, coordinator: Arc<ExchangeCoordinator>) -> Self {
        Self { local_store, coordinator }
    }

    /// The coordinator backing this façade, for admission/session
    /// management callers that need more than the `BlockStore` surface.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<ExchangeCoordinator> {
        &self.coordinator
    }
}

#[async_trait]
impl BlockStore for BlockExchange {
    async fn put(&self, digest: Digest, bytes: Vec<u8>) -> bool {
        self.coordinator.put(digest, bytes).await
    }

    async fn get(&self, digest: &Digest) -> Option<Vec<u8>> {
        self.coordinator.get(*digest).await
    }

    async fn has(&self, digest: &Digest) -> bool {
        self.local_store.has(digest).await
    }

    async fn delete(&self, digest: &Digest) -> bool {
        self.local_store.delete(digest).await
    }

    async fn count(&self) -> usize {
        self.local_store.count().await
    }

    async fn total_bytes(&self) -> u64 {
        self.local_store.total_bytes().await
    }
}
