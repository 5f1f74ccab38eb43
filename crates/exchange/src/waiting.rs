//! The waiting-for-hash table: digests an unsatisfied coordinator is
//! willing to wait on for a peer that has not connected yet.

use std::collections::HashSet;

use tokio::sync::oneshot;

/// One digest waiting on a future peer connection.
pub(crate) struct WaitingEntry {
    /// Peer ids already queried for this digest, so a newly active session
    /// is only asked once.
    pub tried: HashSet<String>,
    /// Fires when some later mechanism resolves the digest.
    pub resolver: Option<oneshot::Sender<Vec<u8>>>,
}

impl WaitingEntry {
    pub(crate) fn new(tried: HashSet<String>, resolver: oneshot::Sender<Vec<u8>>) -> Self {
        Self { tried, resolver: Some(resolver) }
    }
}
