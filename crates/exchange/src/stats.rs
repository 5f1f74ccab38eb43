//! A read-only snapshot of coordinator-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PoolKind;

/// Monotonic coordinator-wide counters, cheap to read concurrently.
#[derive(Default)]
pub struct CoordinatorStats {
    hellos_sent: AtomicU64,
    admissions_accepted: AtomicU64,
    admissions_rejected: AtomicU64,
    fetches_resolved_locally: AtomicU64,
    fetches_resolved_by_peer: AtomicU64,
    fetches_resolved_by_fallback: AtomicU64,
    fetches_resolved_absent: AtomicU64,
    forwards_served: AtomicU64,
    interest_pushes: AtomicU64,
    stale_sessions_dropped: AtomicU64,
}

macro_rules! counter_fns {
    ($($incr:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $incr(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl CoordinatorStats {
    counter_fns! {
        record_hello_sent => hellos_sent,
        record_admission_accepted => admissions_accepted,
        record_admission_rejected => admissions_rejected,
        record_fetch_resolved_locally => fetches_resolved_locally,
        record_fetch_resolved_by_peer => fetches_resolved_by_peer,
        record_fetch_resolved_by_fallback => fetches_resolved_by_fallback,
        record_fetch_resolved_absent => fetches_resolved_absent,
        record_forward_served => forwards_served,
        record_interest_push => interest_pushes,
        record_stale_session_dropped => stale_sessions_dropped,
    }
}

/// Point-in-time coordinator counters plus live pool/queue depths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoordinatorStatsSnapshot {
    /// Connected sessions in the `follows` pool.
    pub follows_connections: usize,
    /// Connected sessions in the `other` pool.
    pub other_connections: usize,
    /// Fetches currently deduplicated in flight.
    pub in_flight_fetches: usize,
    /// Entries in the waiting-for-hash queue.
    pub waiting_for_hash_depth: usize,
    /// Hellos emitted.
    pub hellos_sent: u64,
    /// Inbound connections admitted.
    pub admissions_accepted: u64,
    /// Inbound connections rejected for a full pool.
    pub admissions_rejected: u64,
    /// Fetches answered from the local store.
    pub fetches_resolved_locally: u64,
    /// Fetches answered by a connected peer.
    pub fetches_resolved_by_peer: u64,
    /// Fetches answered by a fallback store.
    pub fetches_resolved_by_fallback: u64,
    /// Fetches that resolved absent after exhausting every source.
    pub fetches_resolved_absent: u64,
    /// Forwarded requests this coordinator satisfied for another peer.
    pub forwards_served: u64,
    /// Interest-push deliveries made on `put`.
    pub interest_pushes: u64,
    /// Stale sessions dropped by the cleanup sweep.
    pub stale_sessions_dropped: u64,
}

impl CoordinatorStats {
    /// Read every counter, combined with externally supplied live depths.
    #[must_use]
    pub fn snapshot(&self, pool_counts: impl Fn(PoolKind) -> usize, in_flight: usize, waiting: usize) -> CoordinatorStatsSnapshot {
        CoordinatorStatsSnapshot {
            follows_connections: pool_counts(PoolKind::Follows),
            other_connections: pool_counts(PoolKind::Other),
            in_flight_fetches: in_flight,
            waiting_for_hash_depth: waiting,
            hellos_sent: self.hellos_sent.load(Ordering::Relaxed),
            admissions_accepted: self.admissions_accepted.load(Ordering::Relaxed),
            admissions_rejected: self.admissions_rejected.load(Ordering::Relaxed),
            fetches_resolved_locally: self.fetches_resolved_locally.load(Ordering::Relaxed),
            fetches_resolved_by_peer: self.fetches_resolved_by_peer.load(Ordering::Relaxed),
            fetches_resolved_by_fallback: self.fetches_resolved_by_fallback.load(Ordering::Relaxed),
            fetches_resolved_absent: self.fetches_resolved_absent.load(Ordering::Relaxed),
            forwards_served: self.forwards_served.load(Ordering::Relaxed),
            interest_pushes: self.interest_pushes.load(Ordering::Relaxed),
            stale_sessions_dropped: self.stale_sessions_dropped.load(Ordering::Relaxed),
        }
    }
}
