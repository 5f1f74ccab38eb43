//! Decoded node shapes and the tree-verification report.

use std::collections::HashMap;

use codec::{ChunkEntry, DirEntry};
use tree_core::Digest;

/// A node decoded from its stored bytes, as returned by
/// [`HashTree::get_tree_node`](crate::HashTree::get_tree_node).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNode {
    /// A directory's named entries, in stored order.
    Directory(Vec<DirEntry>),
    /// A chunked file's ordered chunk list.
    ChunkIndex(Vec<ChunkEntry>),
}

/// The result of walking a tree's reachable nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// `true` iff every digest reachable from the root resolved.
    pub valid: bool,
    /// Digests that were reachable but did not resolve through the store.
    pub missing: Vec<Digest>,
    /// For each missing digest, the digests of the nodes that referenced it.
    pub referenced_by: HashMap<Digest, Vec<Digest>>,
}
