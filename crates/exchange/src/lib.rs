//! Owns every peer session for one tree instance: admission into the
//! `follows`/`other` pools, hello advertising while unsatisfied,
//! sequential-with-delay fetch across peers and fallback stores, request
//! forwarding, interest push on `put`, and periodic stale-session cleanup.
//!
//! This crate is the one place that holds more than one peer session at a
//! time; `peer-session` itself knows nothing about its siblings.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod managed;
mod stats;
mod waiting;

pub use config::{CoordinatorConfig, PoolConfig, PoolKind};
pub use coordinator::{Classifier, ExchangeCoordinator};
pub use managed::SessionState;
pub use stats::{CoordinatorStats, CoordinatorStatsSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use block_store::{BlockStore, MemoryStore};
    use peer_session::{PeerSessionConfig, PeerTransport};
    use signaling::{Envelope, EnvelopeCallback, SignalingBus};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tree_core::Digest;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl PeerTransport for RecordingTransport {
        async fn send_frame(&self, bytes: Vec<u8>) {
            self.sent.lock().await.push(bytes);
        }
    }

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl SignalingBus for RecordingBus {
        async fn publish(&self, envelope: Envelope) {
            self.published.lock().await.push(envelope);
        }

        async fn subscribe(&self, _on_envelope: EnvelopeCallback) {}
    }

    fn test_session_config() -> PeerSessionConfig {
        PeerSessionConfig {
            request_timeout_ms: 200,
            fragment_stall_timeout_ms: 50,
            fragment_total_timeout_ms: 200,
            fragment_size: 4096,
            their_requests_capacity: 16,
            pending_reassemblies_capacity: 16,
            max_htl: 10,
            decrement_at_max_prob: 0.0,
            decrement_at_min_prob: 0.0,
        }
    }

    fn test_coordinator_config() -> CoordinatorConfig {
        CoordinatorConfig {
            follows: PoolConfig { max_connections: 4, satisfied_connections: 2 },
            other: PoolConfig { max_connections: 0, satisfied_connections: 0 },
            peer_query_delay_ms: 30,
            hello_interval_ms: 1_000_000,
            connection_timeout_ms: 15_000,
            stale_sweep_interval_ms: 1_000_000,
            request_timeout_ms: 200,
        }
    }

    fn build_coordinator() -> Arc<ExchangeCoordinator> {
        ExchangeCoordinator::new(
            "local-conn".into(),
            test_coordinator_config(),
            test_session_config(),
            Box::new(|identity: &str| if identity == "friend" { PoolKind::Follows } else { PoolKind::Other }),
            Arc::new(MemoryStore::default()),
            Vec::new(),
            Arc::new(RecordingBus::default()),
        )
    }

    #[tokio::test]
    async fn admits_follows_peer_up_to_pool_capacity() {
        let coordinator = build_coordinator();
        let transport = Arc::new(RecordingTransport::default());
        let session = coordinator.admit("peer-1".into(), "friend", transport);
        assert!(session.is_some());
        assert_eq!(coordinator.stats().admissions_accepted, 1);
    }

    #[tokio::test]
    async fn rejects_admission_when_pool_is_full() {
        let coordinator = build_coordinator();
        let transport = Arc::new(RecordingTransport::default());
        let session = coordinator.admit("peer-1".into(), "stranger", transport);
        assert!(session.is_none());
        assert_eq!(coordinator.stats().admissions_rejected, 1);
    }

    #[tokio::test]
    async fn get_resolves_from_local_store_without_touching_peers() {
        let coordinator = build_coordinator();
        let data = b"already local".to_vec();
        let digest = Digest::of(&data);
        coordinator.put(digest, data.clone()).await;
        let result = coordinator.get(digest).await;
        assert_eq!(result, Some(data));
        assert_eq!(coordinator.stats().fetches_resolved_locally, 1);
    }

    #[tokio::test]
    async fn get_gives_up_absent_when_unsatisfied_peer_never_answers() {
        let coordinator = ExchangeCoordinator::new(
            "local-conn".into(),
            CoordinatorConfig {
                follows: PoolConfig { max_connections: 0, satisfied_connections: 0 },
                other: PoolConfig { max_connections: 0, satisfied_connections: 0 },
                peer_query_delay_ms: 10,
                hello_interval_ms: 1_000_000,
                connection_timeout_ms: 15_000,
                stale_sweep_interval_ms: 1_000_000,
                request_timeout_ms: 1,
            },
            test_session_config(),
            Box::new(|_: &str| PoolKind::Other),
            Arc::new(MemoryStore::default()),
            Vec::new(),
            Arc::new(RecordingBus::default()),
        );
        let digest = Digest::of(b"nowhere to be found");
        let result = coordinator.get(digest).await;
        assert_eq!(result, None);
        assert_eq!(coordinator.stats().fetches_resolved_absent, 1);
    }

    #[tokio::test]
    async fn put_triggers_interest_push_to_a_waiting_peer() {
        let coordinator = build_coordinator();
        let transport = Arc::new(RecordingTransport::default());
        let session = coordinator.admit("peer-1".into(), "friend", transport.clone()).unwrap();
        coordinator.mark_active("peer-1");
        let data = b"worth waiting for".to_vec();
        let digest = Digest::of(&data);
        session.on_frame(&peer_wire::encode(&peer_wire::Frame::Request { hash: digest, htl: 1 })).await;
        assert!(session.has_interest(&digest).await);
        coordinator.put(digest, data.clone()).await;
        assert!(!session.has_interest(&digest).await);
        assert_eq!(coordinator.stats().interest_pushes, 1);
        assert!(!transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn get_falls_back_to_a_configured_fallback_store() {
        let fallback = Arc::new(MemoryStore::default());
        let data = b"in cold storage".to_vec();
        let digest = Digest::of(&data);
        fallback.put(digest, data.clone()).await;
        let coordinator = ExchangeCoordinator::new(
            "local-conn".into(),
            CoordinatorConfig {
                follows: PoolConfig { max_connections: 0, satisfied_connections: 0 },
                other: PoolConfig { max_connections: 0, satisfied_connections: 0 },
                peer_query_delay_ms: 10,
                hello_interval_ms: 1_000_000,
                connection_timeout_ms: 15_000,
                stale_sweep_interval_ms: 1_000_000,
                request_timeout_ms: 200,
            },
            test_session_config(),
            Box::new(|_: &str| PoolKind::Other),
            Arc::new(MemoryStore::default()),
            vec![fallback],
            Arc::new(RecordingBus::default()),
        );
        let result = coordinator.get(digest).await;
        assert_eq!(result, Some(data));
        assert_eq!(coordinator.stats().fetches_resolved_by_fallback, 1);
    }
}
