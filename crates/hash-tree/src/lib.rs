//! The content-addressed merkle tree engine.
//!
//! [`HashTree`] is generic over any [`block_store::BlockStore`], so the same
//! engine runs unmodified whether its blocks live in memory, on disk, or
//! behind the block-exchange façade over the network. Every operation here
//! is copy-on-write: mutating a path never touches an existing block, it
//! writes new blocks along the path and returns a new root [`Cid`].
//!
//! Node shape (leaf blob, chunked-file index, or directory) is not tagged in
//! the stored bytes — callers that ask for a file get file semantics
//! (`read_file*`), callers that ask for a directory get directory semantics
//! (`list_directory`, `set_entry`, ...). [`HashTree::get_tree_node`] is the
//! one place that must recover shape from bytes alone: it tries the chunk
//! index decoder, then the directory decoder, and treats a node that
//! matches neither as a leaf blob.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dirs;
mod files;
mod node;
mod verify;

pub use node::{TreeNode, VerifyReport};

use std::sync::Arc;

use block_store::BlockStore;
use tree_core::{defaults, Cid, Digest, Error, Key, Result};

/// Construction parameters for a [`HashTree`]. Chunk size is fixed for the
/// lifetime of the instance; building the same file under two instances
/// with different chunk sizes produces different root CIDs, which is by
/// design, not an error.
#[derive(Clone, Copy, Debug)]
pub struct HashTreeConfig {
    /// Files larger than this are split into leaf chunks of this size (the
    /// last chunk may be shorter).
    pub chunk_size: u64,
    /// Upper bound on any single stored block's encoded size, checked at
    /// write time.
    pub max_block_size: u64,
}

impl Default for HashTreeConfig {
    fn default() -> Self {
        Self { chunk_size: defaults::CHUNK_SIZE, max_block_size: defaults::MAX_BLOCK_SIZE }
    }
}

/// The tree engine, parameterized over its underlying block store.
pub struct HashTree<S: BlockStore> {
    pub(crate) store: Arc<S>,
    pub(crate) config: HashTreeConfig,
}

impl<S: BlockStore> HashTree<S> {
    /// Build a tree engine over `store` with `config`.
    pub fn new(store: Arc<S>, config: HashTreeConfig) -> Self {
        Self { store, config }
    }

    /// Encrypt (if `key` is given) and store `plaintext`, returning the
    /// digest of the stored bytes. Fails with `StoreWriteFailed` if the
    /// backend rejects the write, and `BadEncoding` if the encoded node
    /// exceeds `max_block_size`.
    pub(crate) async fn store_node(&self, plaintext: &[u8], key: Option<Key>) -> Result<Digest> {
        let stored = match key {
            Some(k) => crypto::encrypt(&k, plaintext)?,
            None => plaintext.to_vec(),
        };
        if stored.len() as u64 > self.config.max_block_size {
            return Err(Error::BadEncoding(format!(
                "encoded node of {} bytes exceeds max_block_size {}",
                stored.len(),
                self.config.max_block_size
            )));
        }
        let digest = Digest::of(&stored);
        if !self.store.put(digest, stored).await {
            return Err(Error::StoreWriteFailed(digest.to_hex()));
        }
        Ok(digest)
    }

    /// Fetch and decrypt (if `cid` carries a key) the plaintext bytes of a node.
    pub(crate) async fn load_node(&self, cid: &Cid) -> Result<Vec<u8>> {
        let stored = self.store.get(&cid.digest).await.ok_or(Error::NotFound(cid.digest))?;
        match cid.key {
            Some(key) => crypto::decrypt(&key, &stored),
            None => Ok(stored),
        }
    }

    /// Decode `cid`'s plaintext as a chunk index, then as a directory,
    /// falling back to treating it as an opaque leaf blob.
    pub async fn get_tree_node(&self, cid: &Cid) -> Result<Option<TreeNode>> {
        let plaintext = self.load_node(cid).await?;
        let encrypted = cid.key.is_some();
        if let Ok(chunks) = codec::decode_chunk_index(&plaintext, encrypted) {
            return Ok(Some(TreeNode::ChunkIndex(chunks)));
        }
        if let Ok(entries) = codec::decode_directory(&plaintext, encrypted) {
            return Ok(Some(TreeNode::Directory(entries)));
        }
        Ok(None)
    }
}
