//! A filesystem-backed [`BlockStore`](crate::BlockStore).
//!
//! Blocks are stored one file per digest, sharded two levels deep
//! (`root/aa/bb/<hex>`) so no directory holds more than a few thousand
//! entries. Writes land in a sibling temp file and are renamed into place,
//! so a reader never observes a partially-written block; reads verify the
//! digest and evict the file if it doesn't match, treating corruption as a
//! miss rather than a crash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tree_core::Digest;

use crate::BlockStore;

/// Durable, fs-indexed block store rooted at a directory.
pub struct DurableStore {
    root: PathBuf,
}

impl DurableStore {
    /// Open (creating if needed) a durable store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(&hex)
    }

    fn tmp_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(".tmp").join(format!("{}.tmp", digest.to_hex()))
    }

    async fn remove_corrupt(&self, path: &Path) {
        let _ = fs::remove_file(path).await;
    }
}

#[async_trait]
impl BlockStore for DurableStore {
    async fn put(&self, digest: Digest, bytes: Vec<u8>) -> bool {
        let final_path = self.path_for(&digest);
        if fs::metadata(&final_path).await.is_ok() {
            return true;
        }
        let Some(parent) = final_path.parent() else { return false };
        if fs::create_dir_all(parent).await.is_err() {
            return false;
        }
        let tmp_path = self.tmp_path(&digest);
        if fs::write(&tmp_path, &bytes).await.is_err() {
            return false;
        }
        match fs::rename(&tmp_path, &final_path).await {
            Ok(()) => true,
            Err(_) => {
                let _ = fs::remove_file(&tmp_path).await;
                fs::metadata(&final_path).await.is_ok()
            }
        }
    }

    async fn get(&self, digest: &Digest) -> Option<Vec<u8>> {
        let path = self.path_for(digest);
        let bytes = fs::read(&path).await.ok()?;
        if Digest::of(&bytes) != *digest {
            self.remove_corrupt(&path).await;
            return None;
        }
        Some(bytes)
    }

    async fn has(&self, digest: &Digest) -> bool {
        fs::metadata(self.path_for(digest)).await.is_ok()
    }

    async fn delete(&self, digest: &Digest) -> bool {
        fs::remove_file(self.path_for(digest)).await.is_ok()
    }

    async fn count(&self) -> usize {
        walk_count(&self.root).await
    }

    async fn total_bytes(&self) -> u64 {
        walk_bytes(&self.root).await
    }
}

async fn walk_count(root: &Path) -> usize {
    walk(root).await.len()
}

async fn walk_bytes(root: &Path) -> u64 {
    let mut total = 0u64;
    for path in walk(root).await {
        if let Ok(meta) = fs::metadata(&path).await {
            total += meta.len();
        }
    }
    total
}

/// Depth-first collection of every regular file under `root`, skipping the
/// `.tmp` staging directory.
async fn walk(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = fs::read_dir(&dir).await else { continue };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()) == Some(".tmp") {
                continue;
            }
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => stack.push(path),
                Ok(ft) if ft.is_file() => out.push(path),
                _ => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests;

    async fn open_temp() -> (DurableStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn satisfies_contract() {
        let (store, _dir) = open_temp().await;
        contract_tests::put_then_get_roundtrips(&store).await;
        let (store, _dir) = open_temp().await;
        contract_tests::missing_digest_is_absent(&store).await;
        let (store, _dir) = open_temp().await;
        contract_tests::delete_removes_entry(&store).await;
    }

    #[tokio::test]
    async fn corrupted_block_is_treated_as_absent() {
        let (store, dir) = open_temp().await;
        let bytes = b"original content".to_vec();
        let digest = Digest::of(&bytes);
        store.put(digest, bytes).await;

        let path = store.path_for(&digest);
        fs::write(&path, b"tampered").await.unwrap();

        assert_eq!(store.get(&digest).await, None);
        assert!(!store.has(&digest).await);
        let _ = dir;
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = b"persisted".to_vec();
        let digest = Digest::of(&bytes);
        {
            let store = DurableStore::open(dir.path()).await.unwrap();
            store.put(digest, bytes.clone()).await;
        }
        let store = DurableStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get(&digest).await, Some(bytes));
    }

    #[tokio::test]
    async fn count_and_total_bytes_ignore_tmp_staging() {
        let (store, _dir) = open_temp().await;
        let a = b"one".to_vec();
        let b = b"two!".to_vec();
        store.put(Digest::of(&a), a.clone()).await;
        store.put(Digest::of(&b), b.clone()).await;
        assert_eq!(store.count().await, 2);
        assert_eq!(store.total_bytes().await, (a.len() + b.len()) as u64);
    }
}
