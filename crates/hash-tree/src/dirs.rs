//! `put_directory` / `list_directory` / `resolve_path` / `set_entry` /
//! `delete_entry`.

use std::collections::HashSet;

use block_store::BlockStore;
use codec::DirEntry;
use tree_core::{Cid, Error, Key, LinkType, Result};

use crate::HashTree;

fn upsert_entry(entries: &mut Vec<DirEntry>, name: &str, cid: Cid, size: u64, link_type: LinkType) {
    if let Some(existing) = entries.iter_mut().find(|e| e.name == name) {
        existing.cid = cid;
        existing.size = size;
        existing.link_type = link_type;
    } else {
        entries.push(DirEntry { name: name.to_string(), link_type, cid, size });
    }
}

impl<S: BlockStore> HashTree<S> {
    async fn decode_directory_entries(&self, cid: &Cid) -> Result<Vec<DirEntry>> {
        let plaintext = self.load_node(cid).await?;
        codec::decode_directory(&plaintext, cid.key.is_some())
    }

    /// Store an ordered list of `(name, CID, size, link_type)` entries as a
    /// new directory node. Fails `DuplicateName` before writing anything if
    /// two entries share a name.
    pub async fn put_directory(&self, entries: Vec<DirEntry>, key: Option<Key>) -> Result<(Cid, u64)> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.name.clone()) {
                return Err(Error::DuplicateName(entry.name.clone()));
            }
        }
        let bytes = codec::encode_directory(&entries, key.is_some());
        let digest = self.store_node(&bytes, key).await?;
        Ok((Cid { digest, key }, 0))
    }

    /// Decode a directory's entries in stored order.
    pub async fn list_directory(&self, cid: &Cid) -> Result<Vec<DirEntry>> {
        self.decode_directory_entries(cid).await
    }

    /// Walk `path` from `root`, returning the CID at the terminal segment.
    /// Fails `NotFound` if any segment is missing, `LinkTypeMismatch` if a
    /// non-terminal segment resolves to a blob rather than a directory.
    pub async fn resolve_path(&self, root: &Cid, path: &[&str]) -> Result<Cid> {
        let mut current = *root;
        for (i, segment) in path.iter().enumerate() {
            let entries = self.decode_directory_entries(&current).await?;
            let entry = entries
                .into_iter()
                .find(|e| &e.name == segment)
                .ok_or(Error::NotFound(current.digest))?;
            if i + 1 < path.len() && entry.link_type != LinkType::Dir {
                return Err(Error::LinkTypeMismatch(entry.name));
            }
            current = entry.cid;
        }
        Ok(current)
    }

    /// Copy-on-write insert or replace of `name` inside the directory at
    /// `dir_path` under `root`. Missing ancestors along `dir_path` are
    /// created as empty directories. `key` encrypts every rewritten
    /// ancestor and should match the key `root` was built with (`None` for
    /// an unencrypted tree). Returns the new root CID.
    ///
    /// Directories whose entries end up byte-identical to before (the
    /// no-op case, e.g. replacing an entry with itself) re-encode to the
    /// same digest by construction — encoding is deterministic and, for
    /// encrypted nodes, the nonce is derived from the plaintext itself — so
    /// the "unchanged root" short-circuit falls out of content addressing
    /// rather than needing explicit equality checks.
    pub async fn set_entry(
        &self,
        root: &Cid,
        dir_path: &[&str],
        name: &str,
        child_cid: Cid,
        size: u64,
        link_type: LinkType,
        key: Option<Key>,
    ) -> Result<Cid> {
        let name = name.to_string();
        self.edit_path(root, dir_path, key, move |entries| {
            upsert_entry(entries, &name, child_cid, size, link_type);
        })
        .await
    }

    /// Copy-on-write removal of `name` from the directory at `dir_path`
    /// under `root`. A no-op (root unchanged) if `name` is absent.
    pub async fn delete_entry(&self, root: &Cid, dir_path: &[&str], name: &str) -> Result<Cid> {
        let name = name.to_string();
        // The key used to rewrite ancestors must match root's own key so
        // that unaffected ancestors still decrypt correctly for siblings.
        let key = root.key;
        self.edit_path(root, dir_path, key, move |entries| {
            entries.retain(|e| e.name != name);
        })
        .await
    }

    async fn edit_path(
        &self,
        root: &Cid,
        dir_path: &[&str],
        key: Option<Key>,
        edit: impl FnOnce(&mut Vec<DirEntry>),
    ) -> Result<Cid> {
        let mut levels: Vec<Vec<DirEntry>> = Vec::with_capacity(dir_path.len() + 1);
        levels.push(self.decode_directory_entries(root).await?);
        for segment in dir_path {
            let found = levels.last().expect("levels never empty").iter().find(|e| &e.name == segment).cloned();
            let child_entries = match found {
                Some(entry) if entry.link_type == LinkType::Dir => self.decode_directory_entries(&entry.cid).await?,
                Some(entry) => return Err(Error::LinkTypeMismatch(entry.name)),
                None => Vec::new(),
            };
            levels.push(child_entries);
        }

        edit(levels.last_mut().expect("levels never empty"));

        let mut new_child: Option<(Cid, u64)> = None;
        for depth in (0..levels.len()).rev() {
            let mut entries = std::mem::take(&mut levels[depth]);
            if let Some((child_cid, child_size)) = new_child.take() {
                upsert_entry(&mut entries, dir_path[depth], child_cid, child_size, LinkType::Dir);
            }
            let bytes = codec::encode_directory(&entries, key.is_some());
            let digest = self.store_node(&bytes, key).await?;
            new_child = Some((Cid { digest, key }, 0));
        }
        Ok(new_child.expect("at least one level, root always present").0)
    }
}
