//! The peer session itself: request dedup, the fulfillment pipeline, and
//! fragment reassembly.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lru::LruCache;
use peer_wire::{decode, encode, Frame};
use rand::thread_rng;
use tokio::sync::{oneshot, Mutex};
use tree_core::Digest;

use crate::config::{PeerHtlConfig, PeerSessionConfig};
use crate::reassembly::Reassembly;
use crate::stats::{PeerStats, PeerStatsSnapshot};
use crate::transport::{ForwardRequests, PeerTransport};
use block_store::BlockStore;

/// Identifies a peer session, typically its connection UUID.
pub type PeerId = String;

/// Why a session was closed. Carried only as far as the `tracing` event
/// `close` emits; nothing reads it back out of the session afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The transport reported a disconnect, or the coordinator is
    /// replacing this session outright.
    Disconnected,
    /// The stale sweep found no activity within the connection timeout.
    Stale,
    /// The coordinator itself is shutting down.
    CoordinatorShutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Stale => "stale",
            Self::CoordinatorShutdown => "coordinator_shutdown",
        };
        f.write_str(s)
    }
}

/// One logical connection to a remote peer.
pub struct PeerSession {
    id: PeerId,
    config: PeerSessionConfig,
    htl_config: PeerHtlConfig,
    transport: Arc<dyn PeerTransport>,
    forwarder: Arc<dyn ForwardRequests>,
    local_store: Arc<dyn BlockStore>,
    our_requests: DashMap<Digest, Vec<oneshot::Sender<Option<Vec<u8>>>>>,
    their_requests: Mutex<LruCache<Digest, ()>>,
    pending_reassemblies: Mutex<LruCache<Digest, Reassembly>>,
    stats: PeerStats,
}

impl PeerSession {
    /// Build a session for `id`, drawing a fresh HTL decrement policy from
    /// `config`'s priors.
    pub fn new(
        id: PeerId,
        config: PeerSessionConfig,
        transport: Arc<dyn PeerTransport>,
        forwarder: Arc<dyn ForwardRequests>,
        local_store: Arc<dyn BlockStore>,
    ) -> Self {
        let htl_config = PeerHtlConfig::draw(&mut thread_rng(), &config);
        Self::with_htl_config(id, config, htl_config, transport, forwarder, local_store)
    }

    /// Build a session with an explicit HTL policy (tests, or a
    /// reconnecting peer that persists its prior draw).
    pub fn with_htl_config(
        id: PeerId,
        config: PeerSessionConfig,
        htl_config: PeerHtlConfig,
        transport: Arc<dyn PeerTransport>,
        forwarder: Arc<dyn ForwardRequests>,
        local_store: Arc<dyn BlockStore>,
    ) -> Self {
        let their_requests = Mutex::new(LruCache::new(
            std::num::NonZeroUsize::new(config.their_requests_capacity.max(1)).expect("max(1) is nonzero"),
        ));
        let pending_reassemblies = Mutex::new(LruCache::new(
            std::num::NonZeroUsize::new(config.pending_reassemblies_capacity.max(1)).expect("max(1) is nonzero"),
        ));
        Self {
            id,
            config,
            htl_config,
            transport,
            forwarder,
            local_store,
            our_requests: DashMap::new(),
            their_requests,
            pending_reassemblies,
            stats: PeerStats::default(),
        }
    }

    /// This session's peer id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// This session's drawn HTL policy.
    #[must_use]
    pub fn htl_config(&self) -> PeerHtlConfig {
        self.htl_config
    }

    /// A snapshot of this session's counters.
    #[must_use]
    pub fn stats(&self) -> PeerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Request `hash` from this peer with hops-to-live `htl`. A second call
    /// for the same digest while one is outstanding shares the first
    /// call's completion rather than sending a second frame.
    #[tracing::instrument(skip(self), fields(peer = %self.id, hash = %hash))]
    pub async fn request(&self, hash: Digest, htl: u8) -> Option<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        let is_new = {
            let mut waiters = self.our_requests.entry(hash).or_default();
            waiters.push(tx);
            waiters.len() == 1
        };
        if is_new {
            self.stats.record_request_sent();
            self.transport.send_frame(encode(&Frame::Request { hash, htl })).await;
        }
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            _ => None,
        }
    }

    /// Dispatch one inbound, already-decoded frame.
    #[tracing::instrument(skip(self, bytes), fields(peer = %self.id))]
    pub async fn on_frame(&self, bytes: &[u8]) {
        match decode(bytes) {
            Ok(Frame::Request { hash, htl }) => self.handle_request(hash, htl).await,
            Ok(Frame::Response { hash, data, fragment }) => self.handle_response(hash, data, fragment).await,
            Err(error) => {
                tracing::debug!(peer = %self.id, %error, "dropped malformed frame");
                self.stats.record_receive_error();
            }
        }
    }

    /// Fulfillment pipeline for an inbound request.
    async fn handle_request(&self, hash: Digest, htl: u8) {
        self.stats.record_request_received();
        if let Some(bytes) = self.local_store.get(&hash).await {
            self.send_response(hash, bytes).await;
            return;
        }
        if htl == 0 {
            return;
        }
        self.mark_their_request(hash).await;
        let next_htl = self.htl_config.decrement(htl, self.config.max_htl);
        if let Some(bytes) = self.forwarder.forward(hash, &self.id, next_htl).await {
            self.send_response(hash, bytes).await;
            self.unmark_their_request(&hash).await;
        }
        // Otherwise stay silent; no amplification of unanswerable requests.
        // The interest recorded above survives for a later push even if
        // forwarding found nothing (or there were no hops left to offer).
    }

    async fn handle_response(&self, hash: Digest, data: Vec<u8>, fragment: Option<(u32, u32)>) {
        let Some((index, total)) = fragment else {
            self.verify_and_resolve(hash, data).await;
            return;
        };
        self.stats.record_fragment_received();
        let assembled = {
            let mut table = self.pending_reassemblies.lock().await;
            if table.get_mut(&hash).is_none() {
                table.put(hash, Reassembly::new(total));
            }
            let entry = table.get_mut(&hash).expect("just inserted");
            entry.insert(index, data);
            if entry.is_complete() {
                table.pop(&hash).map(|r| r.assemble())
            } else {
                None
            }
        };
        if let Some(bytes) = assembled {
            self.stats.record_reassembly_completed();
            self.verify_and_resolve(hash, bytes).await;
        }
    }

    async fn verify_and_resolve(&self, hash: Digest, data: Vec<u8>) {
        if Digest::of(&data) != hash {
            self.stats.record_receive_error();
            return;
        }
        if let Some((_, waiters)) = self.our_requests.remove(&hash) {
            self.stats.record_response_received();
            for tx in waiters {
                let _ = tx.send(Some(data.clone()));
            }
        }
    }

    async fn send_response(&self, hash: Digest, data: Vec<u8>) {
        if data.len() <= self.config.fragment_size {
            self.transport.send_frame(encode(&Frame::Response { hash, data, fragment: None })).await;
        } else {
            let total = data.len().div_ceil(self.config.fragment_size) as u32;
            for (index, chunk) in data.chunks(self.config.fragment_size).enumerate() {
                let frame = Frame::Response { hash, data: chunk.to_vec(), fragment: Some((index as u32, total)) };
                self.transport.send_frame(encode(&frame)).await;
                self.stats.record_fragment_sent();
            }
        }
        self.stats.record_response_sent();
    }

    async fn mark_their_request(&self, hash: Digest) {
        self.their_requests.lock().await.put(hash, ());
    }

    async fn unmark_their_request(&self, hash: &Digest) {
        self.their_requests.lock().await.pop(hash);
    }

    /// Whether this peer previously asked us for `hash` and we could not
    /// fulfill it at the time.
    pub async fn has_interest(&self, hash: &Digest) -> bool {
        self.their_requests.lock().await.contains(hash)
    }

    /// Proactively deliver bytes for a digest this peer is interested in.
    /// No-op if the peer never asked, or we already answered.
    pub async fn push_interest(&self, hash: Digest, bytes: Vec<u8>) {
        let had_interest = self.their_requests.lock().await.pop(&hash).is_some();
        if had_interest {
            self.send_response(hash, bytes).await;
        }
    }

    /// Drop reassemblies that have stalled or exceeded their total budget,
    /// resolving any matching outstanding request as absent. Returns how
    /// many were dropped.
    pub async fn sweep_reassemblies(&self) -> usize {
        let stall = Duration::from_millis(self.config.fragment_stall_timeout_ms);
        let total = Duration::from_millis(self.config.fragment_total_timeout_ms);
        let expired: Vec<Digest> = {
            let table = self.pending_reassemblies.lock().await;
            table.iter().filter(|(_, r)| r.stalled(stall) || r.expired(total)).map(|(d, _)| *d).collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut table = self.pending_reassemblies.lock().await;
        for digest in &expired {
            table.pop(digest);
        }
        drop(table);
        for digest in &expired {
            self.stats.record_fragment_timeout();
            if let Some((_, waiters)) = self.our_requests.remove(digest) {
                for tx in waiters {
                    let _ = tx.send(None);
                }
            }
        }
        expired.len()
    }

    /// Resolve every outstanding `our_requests` entry as absent and drop
    /// all recorded `their_requests`.
    pub async fn close(&self, reason: CloseReason) {
        tracing::info!(peer = %self.id, %reason, "session closed");
        let keys: Vec<Digest> = self.our_requests.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, waiters)) = self.our_requests.remove(&key) {
                for tx in waiters {
                    let _ = tx.send(None);
                }
            }
        }
        self.their_requests.lock().await.clear();
    }
}
