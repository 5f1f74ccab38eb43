//! The exchange coordinator: admission pools, advertising, sequential
//! peer fetch with fallback and waiting-for-hash, forwarding, and
//! interest push.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use block_store::BlockStore;
use dashmap::DashMap;
use peer_session::{CloseReason, ForwardRequests, PeerSession, PeerSessionConfig, PeerTransport};
use signaling::{Envelope, EnvelopeKind, SignalingBus};
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;
use tree_core::{defaults, Digest};

use crate::config::{CoordinatorConfig, PoolKind};
use crate::managed::{ManagedSession, SessionState};
use crate::stats::{CoordinatorStats, CoordinatorStatsSnapshot};
use crate::waiting::WaitingEntry;

/// Classifies a peer's identity into a pool.
pub type Classifier = Box<dyn Fn(&str) -> PoolKind + Send + Sync>;

/// Owns every peer session for one tree instance.
pub struct ExchangeCoordinator {
    local_connection_id: String,
    config: CoordinatorConfig,
    session_config: PeerSessionConfig,
    classifier: Classifier,
    sessions: DashMap<String, ManagedSession>,
    local_store: Arc<dyn BlockStore>,
    fallback_stores: Vec<Arc<dyn BlockStore>>,
    signaling: Arc<dyn SignalingBus>,
    pending_gets: DashMap<Digest, Vec<oneshot::Sender<Option<Vec<u8>>>>>,
    waiting_for_hash: DashMap<Digest, WaitingEntry>,
    stats: CoordinatorStats,
    running: AtomicBool,
}

impl ExchangeCoordinator {
    /// Build a coordinator and start its background advertising and
    /// stale-cleanup loops.
    pub fn new(
        local_connection_id: String,
        config: CoordinatorConfig,
        session_config: PeerSessionConfig,
        classifier: Classifier,
        local_store: Arc<dyn BlockStore>,
        fallback_stores: Vec<Arc<dyn BlockStore>>,
        signaling: Arc<dyn SignalingBus>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            local_connection_id,
            config,
            session_config,
            classifier,
            sessions: DashMap::new(),
            local_store,
            fallback_stores,
            signaling,
            pending_gets: DashMap::new(),
            waiting_for_hash: DashMap::new(),
            stats: CoordinatorStats::default(),
            running: AtomicBool::new(true),
        });
        coordinator.clone().spawn_background_tasks();
        coordinator
    }

    /// Stop advertising and treat the coordinator as no longer running;
    /// in-flight fetches still complete, but new ones skip the
    /// waiting-for-hash step.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// A read-only snapshot of pool occupancy and counters.
    #[must_use]
    pub fn stats(&self) -> CoordinatorStatsSnapshot {
        self.stats.snapshot(
            |kind| self.pool_count(kind),
            self.pending_gets.len(),
            self.waiting_for_hash.len(),
        )
    }

    fn pool_count(&self, kind: PoolKind) -> usize {
        self.sessions.iter().filter(|e| e.pool == kind && e.state == SessionState::Active).count()
    }

    fn is_satisfied(&self) -> bool {
        !self.config.follows.wants_more(self.pool_count(PoolKind::Follows))
            && !self.config.other.wants_more(self.pool_count(PoolKind::Other))
    }

    /// Attempt to admit a newly offered peer into its classified pool.
    /// Returns `None` if that pool is already at `max_connections`
    /// (`AdmissionRejected`): no session is created and nothing is sent.
    pub fn admit(self: &Arc<Self>, peer_id: String, identity: &str, transport: Arc<dyn PeerTransport>) -> Option<Arc<PeerSession>> {
        let pool = (self.classifier)(identity);
        let pool_cfg = match pool {
            PoolKind::Follows => self.config.follows,
            PoolKind::Other => self.config.other,
        };
        if !pool_cfg.has_room(self.pool_count(pool)) {
            self.stats.record_admission_rejected();
            return None;
        }
        let forwarder: Arc<dyn ForwardRequests> = self.clone();
        let session = Arc::new(PeerSession::new(peer_id.clone(), self.session_config, transport, forwarder, self.local_store.clone()));
        self.sessions.insert(peer_id, ManagedSession::new(session.clone(), pool));
        self.stats.record_admission_accepted();
        Some(session)
    }

    /// Mark a previously admitted session as ready to serve requests, and
    /// try it against anything in the waiting-for-hash queue it has not
    /// been asked about yet.
    pub fn mark_active(self: &Arc<Self>, peer_id: &str) {
        let Some(session) = self.sessions.get_mut(peer_id).map(|mut e| {
            e.state = SessionState::Active;
            e.session.clone()
        }) else {
            return;
        };
        let digests: Vec<Digest> =
            self.waiting_for_hash.iter().filter(|e| !e.value().tried.contains(peer_id)).map(|e| *e.key()).collect();
        for digest in digests {
            if let Some(mut entry) = self.waiting_for_hash.get_mut(&digest) {
                entry.tried.insert(peer_id.to_string());
            }
            let coordinator = self.clone();
            let session = session.clone();
            tokio::spawn(async move {
                if let Some(bytes) = session.request(digest, defaults::MAX_HTL).await {
                    coordinator.resolve_waiting(digest, bytes).await;
                }
            });
        }
    }

    /// Remove a session outright (a transport-level disconnect, say)
    /// without waiting for the next stale sweep.
    pub async fn drop_session(&self, peer_id: &str) {
        if let Some((_, managed)) = self.sessions.remove(peer_id) {
            managed.session.close(CloseReason::Disconnected).await;
        }
    }

    /// `get(digest)`: local store, then dedup against an in-flight fetch,
    /// then sequential peer query, then fallback stores, then (if
    /// unsatisfied) the waiting-for-hash queue.
    #[instrument(skip(self), fields(digest = %digest))]
    pub async fn get(&self, digest: Digest) -> Option<Vec<u8>> {
        if let Some(bytes) = self.local_store.get(&digest).await {
            self.stats.record_fetch_resolved_locally();
            return Some(bytes);
        }
        let (tx, rx) = oneshot::channel();
        let is_first = {
            let mut waiters = self.pending_gets.entry(digest).or_default();
            waiters.push(tx);
            waiters.len() == 1
        };
        if !is_first {
            return rx.await.ok().flatten();
        }
        let result = self.fetch_uncached(digest).await;
        if let Some((_, waiters)) = self.pending_gets.remove(&digest) {
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
        result
    }

    async fn fetch_uncached(&self, digest: Digest) -> Option<Vec<u8>> {
        let mut tried = HashSet::new();
        if let Some(bytes) = self.query_connected_peers(digest, &mut tried, defaults::MAX_HTL).await {
            self.local_store.put(digest, bytes.clone()).await;
            self.stats.record_fetch_resolved_by_peer();
            return Some(bytes);
        }
        for store in &self.fallback_stores {
            if let Some(bytes) = store.get(&digest).await {
                self.local_store.put(digest, bytes.clone()).await;
                self.stats.record_fetch_resolved_by_fallback();
                return Some(bytes);
            }
        }
        if self.running.load(Ordering::Relaxed) && !self.is_satisfied() {
            if let Some(bytes) = self.wait_for_hash(digest, tried).await {
                return Some(bytes);
            }
        }
        self.stats.record_fetch_resolved_absent();
        None
    }

    async fn wait_for_hash(&self, digest: Digest, tried: HashSet<String>) -> Option<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.waiting_for_hash.insert(digest, WaitingEntry::new(tried, tx));
        let budget = Duration::from_millis(self.config.waiting_for_hash_timeout_ms());
        let result = tokio::time::timeout(budget, rx).await.ok().and_then(Result::ok);
        self.waiting_for_hash.remove(&digest);
        result
    }

    async fn resolve_waiting(&self, digest: Digest, bytes: Vec<u8>) {
        self.local_store.put(digest, bytes.clone()).await;
        if let Some((_, mut entry)) = self.waiting_for_hash.remove(&digest) {
            if let Some(resolver) = entry.resolver.take() {
                let _ = resolver.send(bytes.clone());
            }
        }
        if let Some((_, waiters)) = self.pending_gets.remove(&digest) {
            for waiter in waiters {
                let _ = waiter.send(Some(bytes.clone()));
            }
        }
    }

    /// Ordered `(peer_id, session)` pairs for every active session not in
    /// `excluded`, `follows` pool first.
    fn ordered_active_peers(&self, excluded: &HashSet<String>) -> Vec<(String, Arc<PeerSession>)> {
        let mut follows = Vec::new();
        let mut other = Vec::new();
        for entry in self.sessions.iter() {
            if entry.state != SessionState::Active || excluded.contains(entry.key()) {
                continue;
            }
            let item = (entry.key().clone(), entry.session.clone());
            match entry.pool {
                PoolKind::Follows => follows.push(item),
                PoolKind::Other => other.push(item),
            }
        }
        follows.extend(other);
        follows
    }

    /// Sequentially query connected peers (already-tried ids recorded into
    /// `tried`), racing each query against `peer_query_delay_ms` before
    /// moving to the next peer without cancelling the one in flight.
    async fn query_connected_peers(&self, digest: Digest, tried: &mut HashSet<String>, htl: u8) -> Option<Vec<u8>> {
        let peers = self.ordered_active_peers(tried);
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<Vec<u8>>>();
        let delay = Duration::from_millis(self.config.peer_query_delay_ms);
        for (peer_id, session) in peers {
            tried.insert(peer_id);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = session.request(digest, htl).await;
                let _ = tx.send(result);
            });
            if let Ok(Some(bytes)) = tokio::time::timeout(delay, Self::next_hit(&mut rx)).await {
                return Some(bytes);
            }
        }
        drop(tx);
        while let Ok(item) = rx.try_recv() {
            if let Some(bytes) = item {
                return Some(bytes);
            }
        }
        None
    }

    async fn next_hit(rx: &mut mpsc::UnboundedReceiver<Option<Vec<u8>>>) -> Option<Vec<u8>> {
        while let Some(item) = rx.recv().await {
            if item.is_some() {
                return item;
            }
        }
        None
    }

    /// `put(digest, bytes)` on the exchange façade: write through locally,
    /// then deliver to any peer whose `their_requests` remembers asking.
    pub async fn put(&self, digest: Digest, bytes: Vec<u8>) -> bool {
        let ok = self.local_store.put(digest, bytes.clone()).await;
        if ok {
            self.push_interest(digest, bytes).await;
        }
        ok
    }

    async fn push_interest(&self, digest: Digest, bytes: Vec<u8>) {
        let sessions: Vec<Arc<PeerSession>> =
            self.sessions.iter().filter(|e| e.state == SessionState::Active).map(|e| e.session.clone()).collect();
        for session in sessions {
            if session.has_interest(&digest).await {
                session.push_interest(digest, bytes.clone()).await;
                self.stats.record_interest_push();
            }
        }
    }

    fn spawn_background_tasks(self: Arc<Self>) {
        let hello = self.clone();
        tokio::spawn(async move { hello.hello_loop().await });
        let cleanup = self.clone();
        tokio::spawn(async move { cleanup.stale_cleanup_loop().await });
    }

    async fn hello_loop(&self) {
        while self.running.load(Ordering::Relaxed) {
            if !self.is_satisfied() {
                let envelope = Envelope {
                    kind: EnvelopeKind::Hello,
                    recipient: None,
                    peer_id: self.local_connection_id.clone(),
                    payload: Vec::new(),
                };
                self.signaling.publish(envelope).await;
                self.stats.record_hello_sent();
            }
            tokio::time::sleep(Duration::from_millis(self.config.hello_interval_ms)).await;
        }
    }

    async fn stale_cleanup_loop(&self) {
        while self.running.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(self.config.stale_sweep_interval_ms)).await;
            let sessions: Vec<Arc<PeerSession>> = self.sessions.iter().map(|e| e.session.clone()).collect();
            for session in sessions {
                session.sweep_reassemblies().await;
            }
            let connection_timeout = Duration::from_millis(self.config.connection_timeout_ms);
            let stale: Vec<String> =
                self.sessions.iter().filter(|e| e.is_stale(connection_timeout)).map(|e| e.key().clone()).collect();
            for peer_id in stale {
                if let Some((_, managed)) = self.sessions.remove(&peer_id) {
                    managed.session.close(CloseReason::Stale).await;
                    self.stats.record_stale_session_dropped();
                }
            }
        }
    }
}

#[async_trait]
impl ForwardRequests for ExchangeCoordinator {
    #[instrument(skip(self), fields(digest = %hash, excluded = %excluded_peer_id))]
    async fn forward(&self, hash: Digest, excluded_peer_id: &str, htl_after_decrement: u8) -> Option<Vec<u8>> {
        if htl_after_decrement == 0 {
            return None;
        }
        let mut excluded = HashSet::new();
        excluded.insert(excluded_peer_id.to_string());
        let bytes = self.query_connected_peers(hash, &mut excluded, htl_after_decrement).await?;
        self.local_store.put(hash, bytes.clone()).await;
        self.stats.record_forward_served();
        Some(bytes)
    }
}
