//! `put_file` / `read_file*`.

use block_store::BlockStore;
use codec::ChunkEntry;
use futures_core::stream::Stream;
use tree_core::{Cid, Error, Key, Result};

use crate::HashTree;

impl<S: BlockStore> HashTree<S> {
    /// Store `bytes` as a file. Files at or under the configured chunk size
    /// are stored as a single leaf block; larger files are split into
    /// `chunk_size` chunks (the last possibly shorter), each stored
    /// individually, with a chunked-file index node referencing them in
    /// order. Returns the new CID and the plaintext size.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn put_file(&self, bytes: &[u8], key: Option<Key>) -> Result<(Cid, u64)> {
        let size = bytes.len() as u64;
        if size <= self.config.chunk_size {
            let digest = self.store_node(bytes, key).await?;
            return Ok((Cid { digest, key }, size));
        }

        let mut chunks = Vec::new();
        for chunk in bytes.chunks(self.config.chunk_size as usize) {
            let digest = self.store_node(chunk, key).await?;
            chunks.push(ChunkEntry { cid: Cid { digest, key }, size: chunk.len() as u64 });
        }
        let index_bytes = codec::encode_chunk_index(&chunks, key.is_some());
        let digest = self.store_node(&index_bytes, key).await?;
        Ok((Cid { digest, key }, size))
    }

    /// Fully materialize a file's plaintext bytes.
    pub async fn read_file(&self, cid: &Cid) -> Result<Vec<u8>> {
        match self.chunks_of(cid).await? {
            Some(chunks) => {
                let mut out = Vec::new();
                for chunk in &chunks {
                    out.extend_from_slice(&self.load_node(&chunk.cid).await?);
                }
                Ok(out)
            }
            None => self.load_node(cid).await,
        }
    }

    /// Read only the bytes in `[start, end)` of a file's plaintext,
    /// fetching only the chunks that intersect the range.
    pub async fn read_file_range(&self, cid: &Cid, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start {
            return Err(Error::BadEncoding("range end before start".into()));
        }
        match self.chunks_of(cid).await? {
            Some(chunks) => {
                let mut out = Vec::new();
                let mut offset = 0u64;
                for chunk in &chunks {
                    let chunk_start = offset;
                    let chunk_end = offset + chunk.size;
                    offset = chunk_end;
                    if chunk_end <= start || chunk_start >= end {
                        continue;
                    }
                    let bytes = self.load_node(&chunk.cid).await?;
                    let lo = start.saturating_sub(chunk_start) as usize;
                    let hi = (end.min(chunk_end) - chunk_start) as usize;
                    out.extend_from_slice(&bytes[lo..hi]);
                }
                Ok(out)
            }
            None => {
                let bytes = self.load_node(cid).await?;
                let lo = (start as usize).min(bytes.len());
                let hi = (end as usize).min(bytes.len());
                Ok(bytes[lo..hi].to_vec())
            }
        }
    }

    /// A lazy, in-order stream of a file's chunks, restartable from `cid`.
    /// For a single-leaf file the stream yields exactly one item.
    pub fn read_file_stream<'a>(&'a self, cid: &'a Cid) -> impl Stream<Item = Result<Vec<u8>>> + 'a {
        async_stream::try_stream! {
            match self.chunks_of(cid).await? {
                Some(chunks) => {
                    for chunk in chunks {
                        yield self.load_node(&chunk.cid).await?;
                    }
                }
                None => {
                    yield self.load_node(cid).await?;
                }
            }
        }
    }

    /// `Some(chunks)` if `cid` decodes as a chunked-file index, `None` if it
    /// is a leaf blob.
    async fn chunks_of(&self, cid: &Cid) -> Result<Option<Vec<ChunkEntry>>> {
        let plaintext = self.load_node(cid).await?;
        Ok(codec::decode_chunk_index(&plaintext, cid.key.is_some()).ok())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use block_store::MemoryStore;
    use futures::StreamExt;
    use tree_core::Key;

    use crate::{HashTree, HashTreeConfig};

    fn small_chunk_tree() -> HashTree<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        HashTree::new(store, HashTreeConfig { chunk_size: 4, max_block_size: 1 << 20 })
    }

    #[tokio::test]
    async fn single_small_file_roundtrips() {
        let tree = small_chunk_tree();
        let (cid, size) = tree.put_file(b"abc", None).await.unwrap();
        assert_eq!(size, 3);
        assert_eq!(tree.read_file(&cid).await.unwrap(), b"abc");
        assert!(tree.chunks_of(&cid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunking_splits_at_boundaries() {
        let tree = small_chunk_tree();
        let (cid, size) = tree.put_file(b"abcdefghij", None).await.unwrap();
        assert_eq!(size, 10);
        let chunks = tree.chunks_of(&cid).await.unwrap().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(tree.read_file(&cid).await.unwrap(), b"abcdefghij");
    }

    #[tokio::test]
    async fn range_read_spans_chunk_boundary() {
        let tree = small_chunk_tree();
        let (cid, _) = tree.put_file(b"abcdefghij", None).await.unwrap();
        let out = tree.read_file_range(&cid, 3, 7).await.unwrap();
        assert_eq!(out, b"defg");
    }

    #[tokio::test]
    async fn range_read_on_single_leaf() {
        let tree = small_chunk_tree();
        let (cid, _) = tree.put_file(b"ab", None).await.unwrap();
        assert_eq!(tree.read_file_range(&cid, 0, 1).await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn stream_yields_chunks_in_order() {
        let tree = small_chunk_tree();
        let (cid, _) = tree.put_file(b"abcdefghij", None).await.unwrap();
        let mut stream = Box::pin(tree.read_file_stream(&cid));
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"abcdefghij");
    }

    #[tokio::test]
    async fn encrypted_roundtrip() {
        let tree = small_chunk_tree();
        let key = Key([5u8; 32]);
        let (cid, _) = tree.put_file(b"abcdefghij", Some(key)).await.unwrap();
        assert!(cid.is_encrypted());
        assert_eq!(tree.read_file(&cid).await.unwrap(), b"abcdefghij");
    }

    #[tokio::test]
    async fn same_content_and_key_converges_to_same_cid() {
        let tree = small_chunk_tree();
        let key = Key([5u8; 32]);
        let (cid1, _) = tree.put_file(b"same content here", Some(key)).await.unwrap();
        let (cid2, _) = tree.put_file(b"same content here", Some(key)).await.unwrap();
        assert_eq!(cid1, cid2);
    }

    #[tokio::test]
    async fn missing_block_is_not_found() {
        let tree = small_chunk_tree();
        let bogus = Cid::plain(tree_core::Digest::of(b"never stored"));
        assert!(matches!(tree.read_file(&bogus).await, Err(tree_core::Error::NotFound(_))));
    }
}
