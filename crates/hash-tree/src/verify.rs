//! `verify_tree`.

use std::collections::{HashMap, HashSet, VecDeque};

use block_store::BlockStore;
use tree_core::{Cid, Digest, Result};

use crate::{HashTree, TreeNode, VerifyReport};

impl<S: BlockStore> HashTree<S> {
    /// BFS over every node reachable from `root`, reporting digests that
    /// fail to resolve. `valid` is `true` iff `missing` is empty;
    /// `referenced_by` maps each missing digest to the digests of the nodes
    /// that linked to it, so callers can locate the damage.
    pub async fn verify_tree(&self, root: &Cid) -> Result<VerifyReport> {
        let mut visited = HashSet::new();
        let mut parents: HashMap<Digest, Vec<Digest>> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(*root);
        visited.insert(root.digest);

        let mut missing = Vec::new();
        while let Some(cid) = queue.pop_front() {
            match self.get_tree_node(&cid).await {
                Ok(Some(TreeNode::Directory(entries))) => {
                    for entry in entries {
                        Self::link(&mut parents, cid.digest, entry.cid.digest);
                        if visited.insert(entry.cid.digest) {
                            queue.push_back(entry.cid);
                        }
                    }
                }
                Ok(Some(TreeNode::ChunkIndex(chunks))) => {
                    for chunk in chunks {
                        Self::link(&mut parents, cid.digest, chunk.cid.digest);
                        if visited.insert(chunk.cid.digest) {
                            queue.push_back(chunk.cid);
                        }
                    }
                }
                Ok(None) => {}
                Err(tree_core::Error::NotFound(_)) => missing.push(cid.digest),
                Err(e) => return Err(e),
            }
        }

        missing.sort_by_key(|d| d.0);
        let referenced_by = missing
            .iter()
            .map(|d| (*d, parents.get(d).cloned().unwrap_or_default()))
            .collect();
        Ok(VerifyReport { valid: missing.is_empty(), missing, referenced_by })
    }

    fn link(parents: &mut HashMap<Digest, Vec<Digest>>, parent: Digest, child: Digest) {
        parents.entry(child).or_default().push(parent);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use block_store::MemoryStore;
    use codec::DirEntry;
    use tree_core::{Cid, Digest, LinkType};

    use crate::{HashTree, HashTreeConfig};

    fn tree() -> HashTree<MemoryStore> {
        HashTree::new(Arc::new(MemoryStore::new()), HashTreeConfig::default())
    }

    #[tokio::test]
    async fn valid_tree_reports_no_missing() {
        let t = tree();
        let (file_cid, size) = t.put_file(b"hello world", None).await.unwrap();
        let (root, _) = t
            .put_directory(vec![DirEntry { name: "hello.txt".into(), link_type: LinkType::Blob, cid: file_cid, size }], None)
            .await
            .unwrap();
        let report = t.verify_tree(&root).await.unwrap();
        assert!(report.valid);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn dangling_link_is_reported_missing_with_referrer() {
        let t = tree();
        let dangling = Cid::plain(Digest::of(b"never stored"));
        let (root, _) = t
            .put_directory(vec![DirEntry { name: "ghost".into(), link_type: LinkType::Blob, cid: dangling, size: 0 }], None)
            .await
            .unwrap();
        let report = t.verify_tree(&root).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.missing, vec![dangling.digest]);
        assert_eq!(report.referenced_by.get(&dangling.digest), Some(&vec![root.digest]));
    }

    #[tokio::test]
    async fn chunked_file_missing_chunk_detected() {
        let t = HashTree::new(Arc::new(MemoryStore::new()), HashTreeConfig { chunk_size: 2, max_block_size: 1 << 20 });
        let (cid, _) = t.put_file(b"abcd", None).await.unwrap();
        let chunks = match t.get_tree_node(&cid).await.unwrap().unwrap() {
            crate::TreeNode::ChunkIndex(chunks) => chunks,
            _ => panic!("expected a chunk index"),
        };
        t.store.delete(&chunks[0].cid.digest).await;
        let report = t.verify_tree(&cid).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.missing, vec![chunks[0].cid.digest]);
    }
}
