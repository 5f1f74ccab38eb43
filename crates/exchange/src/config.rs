//! Coordinator-wide timeouts and the two built-in pools.

use tree_core::defaults;

/// Which pool a connected peer counts against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Peers the local identity prefers.
    Follows,
    /// Anyone else.
    Other,
}

/// Admission bounds and advertising threshold for one pool.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    /// Hard cap; admission is refused once a pool holds this many sessions.
    pub max_connections: usize,
    /// While connected sessions in this pool are below this count, the
    /// coordinator keeps advertising for more.
    pub satisfied_connections: usize,
}

impl PoolConfig {
    /// Whether this pool currently wants more connections.
    #[must_use]
    pub fn wants_more(&self, current: usize) -> bool {
        current < self.satisfied_connections
    }

    /// Whether one more session would still fit.
    #[must_use]
    pub fn has_room(&self, current: usize) -> bool {
        current < self.max_connections
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_connections: defaults::POOL_MAX_CONNECTIONS, satisfied_connections: defaults::POOL_SATISFIED_CONNECTIONS }
    }
}

/// Timeouts and pool bounds for one [`crate::ExchangeCoordinator`].
#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// Bounds for the `follows` pool.
    pub follows: PoolConfig,
    /// Bounds for the `other` pool.
    pub other: PoolConfig,
    /// Delay raced against each peer query during sequential fetch.
    pub peer_query_delay_ms: u64,
    /// How often an unsatisfied coordinator re-emits a hello.
    pub hello_interval_ms: u64,
    /// How long a session may sit in `New` before stale cleanup drops it.
    pub connection_timeout_ms: u64,
    /// How often the stale-session sweep runs (also the admission-probe
    /// cadence).
    pub stale_sweep_interval_ms: u64,
    /// Per-request timeout used both for peer requests and to derive the
    /// waiting-for-hash budget (`request_timeout * 6`, floor 30s).
    pub request_timeout_ms: u64,
}

impl CoordinatorConfig {
    /// How long `get` waits in the waiting-for-hash queue once every
    /// connected peer and fallback store has been exhausted.
    #[must_use]
    pub fn waiting_for_hash_timeout_ms(&self) -> u64 {
        (self.request_timeout_ms * 6).max(defaults::MIN_WAITING_FOR_HASH_MS)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            follows: PoolConfig::default(),
            other: PoolConfig::default(),
            peer_query_delay_ms: defaults::PEER_QUERY_DELAY_MS,
            hello_interval_ms: defaults::HELLO_INTERVAL_MS,
            connection_timeout_ms: defaults::CONNECTION_TIMEOUT_MS,
            stale_sweep_interval_ms: defaults::ADMISSION_SWEEP_INTERVAL_MS,
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_for_hash_timeout_has_a_floor() {
        let cfg = CoordinatorConfig { request_timeout_ms: 1_000, ..CoordinatorConfig::default() };
        assert_eq!(cfg.waiting_for_hash_timeout_ms(), 30_000);
        let cfg = CoordinatorConfig { request_timeout_ms: 10_000, ..CoordinatorConfig::default() };
        assert_eq!(cfg.waiting_for_hash_timeout_ms(), 60_000);
    }

    #[test]
    fn pool_config_thresholds() {
        let pool = PoolConfig { max_connections: 4, satisfied_connections: 2 };
        assert!(pool.wants_more(1));
        assert!(!pool.wants_more(2));
        assert!(pool.has_room(3));
        assert!(!pool.has_room(4));
    }
}
