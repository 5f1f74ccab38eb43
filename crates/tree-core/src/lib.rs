//! Shared primitives for the hash-tree workspace: digests, content identifiers,
//! the error taxonomy and small timing/id helpers used by every other crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;

pub mod ids;

/// A 32-byte SHA-256 digest over a block's stored bytes.
///
/// Equality and hashing derive from the bytes; a `Digest` never carries key
/// material, so it is safe to pass across the wire and log.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// SHA-256 of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        use sha2::{Digest as _, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut d = [0u8; 32];
        d.copy_from_slice(&out);
        Digest(d)
    }

    /// Lowercase hex encoding, used for store paths and log fields.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a lowercase hex digest. Returns `None` on malformed input.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Digest(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Shape of the link a directory entry points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LinkType {
    /// A leaf blob or chunked-file index.
    Blob,
    /// A nested directory node.
    Dir,
}

impl LinkType {
    /// Wire tag: `0x00` for `Blob`, `0x01` for `Dir`.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            LinkType::Blob => 0x00,
            LinkType::Dir => 0x01,
        }
    }

    /// Decode a wire tag; `None` on an unrecognized value.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(LinkType::Blob),
            0x01 => Some(LinkType::Dir),
            _ => None,
        }
    }
}

/// A 32-byte symmetric key used to encrypt a node and, transitively, the key
/// domain of its encrypted children.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Key(pub [u8; 32]);

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// A content identifier: a digest plus an optional symmetric key.
///
/// The key marks the referenced block as encrypted. Digests alone cross the
/// wire and live in the block store; CIDs are the unit the tree engine and
/// its callers exchange, and keys never leave the identity that owns them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cid {
    /// Digest of the stored (possibly encrypted) bytes.
    pub digest: Digest,
    /// Symmetric key, if this node is encrypted.
    pub key: Option<Key>,
}

impl Cid {
    /// A plaintext (unencrypted) CID.
    #[must_use]
    pub fn plain(digest: Digest) -> Self {
        Self { digest, key: None }
    }

    /// An encrypted CID.
    #[must_use]
    pub fn encrypted(digest: Digest, key: Key) -> Self {
        Self { digest, key: Some(key) }
    }

    /// Whether this CID carries a key.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

/// Error taxonomy shared by the codec, crypto, store, tree, and exchange
/// layers. Transient network conditions are represented here
/// too so callers deep in the exchange stack can propagate with `?`; the
/// session/coordinator layers are responsible for absorbing the transient
/// ones into `Option` before they reach tree-engine callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tree engine could not resolve a digest through the store.
    #[error("not found: {0}")]
    NotFound(Digest),
    /// The codec rejected malformed node bytes.
    #[error("bad encoding: {0}")]
    BadEncoding(String),
    /// Received bytes did not hash to the expected digest.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Digest the caller asked for.
        expected: Digest,
        /// Digest actually computed over the received bytes.
        actual: Digest,
    },
    /// `put_directory` was given two entries with the same name.
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    /// A non-terminal path segment resolved to a blob, not a directory.
    #[error("link type mismatch at {0}: expected a directory")]
    LinkTypeMismatch(String),
    /// A peer request, waiting-for-hash entry, or fragment reassembly
    /// exceeded its budget. Resolved as absence, never raised to a caller;
    /// kept here so internal plumbing can still use `Result`.
    #[error("timeout")]
    Timeout,
    /// A new peer arrived but its pool was already at capacity.
    #[error("admission rejected")]
    AdmissionRejected,
    /// A durable backend rejected a write.
    #[error("store write failed: {0}")]
    StoreWriteFailed(String),
    /// Underlying I/O failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Cryptographic failure (AEAD, key, nonce).
    #[error("crypto: {0}")]
    Crypto(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Global numeric defaults, collected so every crate
/// constructs its own `Config` against the same baseline rather than
/// hand-rolling magic numbers.
pub mod defaults {
    /// Default construction chunk size for `put_file` (1 MiB).
    pub const CHUNK_SIZE: usize = 1024 * 1024;
    /// Default maximum block size enforced at encode time (2 MiB).
    pub const MAX_BLOCK_SIZE: usize = 2 * 1024 * 1024;
    /// Default fragmentation threshold for peer responses (16 KiB).
    pub const FRAGMENT_SIZE: usize = 16 * 1024;
    /// Per-peer request timeout.
    pub const REQUEST_TIMEOUT_MS: u64 = 5_000;
    /// Inter-peer delay the coordinator races a query against.
    pub const PEER_QUERY_DELAY_MS: u64 = 500;
    /// Minimum waiting-for-hash timeout (also the floor on `request_timeout * 6`).
    pub const MIN_WAITING_FOR_HASH_MS: u64 = 30_000;
    /// Fragment reassembly stall timeout.
    pub const FRAGMENT_STALL_TIMEOUT_MS: u64 = 5_000;
    /// Fragment reassembly total timeout.
    pub const FRAGMENT_TOTAL_TIMEOUT_MS: u64 = 60_000;
    /// Hello advertisement interval.
    pub const HELLO_INTERVAL_MS: u64 = 10_000;
    /// Connection establishment timeout before a `new` session is dropped.
    pub const CONNECTION_TIMEOUT_MS: u64 = 15_000;
    /// Stale-session sweep interval.
    pub const ADMISSION_SWEEP_INTERVAL_MS: u64 = 5_000;
    /// Capacity of a peer session's `their_requests` LRU.
    pub const THEIR_REQUESTS_CAPACITY: usize = 200;
    /// Capacity of a peer session's `pending_reassemblies` table.
    pub const PENDING_REASSEMBLIES_CAPACITY: usize = 64;
    /// Hops-to-live ceiling; values above this are not meaningful.
    pub const MAX_HTL: u8 = 10;
    /// Default probability a peer decrements HTL when it is at `MAX_HTL`.
    pub const DECREMENT_AT_MAX_PROB: f64 = 0.5;
    /// Default probability a peer decrements HTL from `1` to `0`.
    pub const DECREMENT_AT_MIN_PROB: f64 = 0.5;
    /// Default hard cap on connections in one pool.
    pub const POOL_MAX_CONNECTIONS: usize = 50;
    /// Default floor below which a pool keeps advertising for more peers.
    pub const POOL_SATISFIED_CONNECTIONS: usize = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_roundtrips_through_hex() {
        let d = Digest::of(b"hello world");
        let hex = d.to_hex();
        assert_eq!(Digest::from_hex(&hex), Some(d));
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(Digest::of(b"abc"), Digest::of(b"abc"));
        assert_ne!(Digest::of(b"abc"), Digest::of(b"abd"));
    }

    #[test]
    fn link_type_tag_roundtrip() {
        assert_eq!(LinkType::from_tag(LinkType::Blob.tag()), Some(LinkType::Blob));
        assert_eq!(LinkType::from_tag(LinkType::Dir.tag()), Some(LinkType::Dir));
        assert_eq!(LinkType::from_tag(0xFF), None);
    }

    #[test]
    fn cid_plain_has_no_key() {
        let cid = Cid::plain(Digest::of(b"x"));
        assert!(!cid.is_encrypted());
    }
}
