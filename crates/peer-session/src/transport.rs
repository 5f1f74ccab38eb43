//! Collaborator traits a [`PeerSession`](crate::PeerSession) is built
//! against: the raw datagram channel, and the coordinator's forwarding
//! entry point. Both are implemented one layer up (by the exchange
//! coordinator), keeping this crate free of any dependency on it.

use async_trait::async_trait;
use tree_core::Digest;

/// The reliable, ordered-or-unordered datagram channel to one remote peer
/// A session only ever pushes encoded frames through this;
/// inbound frames arrive via [`crate::PeerSession::on_frame`] instead of a
/// matching `recv`, so the transport need not be polled.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send one already-encoded frame. Best-effort: sessions do not block
    /// on transport acknowledgement, only on the application-level response.
    async fn send_frame(&self, bytes: Vec<u8>);
}

/// What a session calls into when it cannot fulfill a request locally and
/// has hops remaining.
#[async_trait]
pub trait ForwardRequests: Send + Sync {
    /// Ask the coordinator to satisfy `hash` from some other connected
    /// peer, excluding `excluded_peer_id` (the peer that asked us), with
    /// `htl_after_decrement` as the HTL to offer onward.
    async fn forward(&self, hash: Digest, excluded_peer_id: &str, htl_after_decrement: u8) -> Option<Vec<u8>>;
}
