//! Per-peer counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one peer session. Cheap to read concurrently;
/// meant to back a metrics export, not to gate behavior.
#[derive(Default)]
pub struct PeerStats {
    requests_sent: AtomicU64,
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    responses_received: AtomicU64,
    receive_errors: AtomicU64,
    fragments_sent: AtomicU64,
    fragments_received: AtomicU64,
    reassemblies_completed: AtomicU64,
    fragment_timeouts: AtomicU64,
}

/// A point-in-time copy of [`PeerStats`], convenient to log or serialize.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerStatsSnapshot {
    /// Requests we sent to this peer.
    pub requests_sent: u64,
    /// Requests this peer sent us.
    pub requests_received: u64,
    /// Responses we sent to this peer.
    pub responses_sent: u64,
    /// Responses we received and accepted from this peer.
    pub responses_received: u64,
    /// Responses discarded for failing digest verification.
    pub receive_errors: u64,
    /// Fragments we sent.
    pub fragments_sent: u64,
    /// Fragments we received.
    pub fragments_received: u64,
    /// Fragmented responses that reassembled successfully.
    pub reassemblies_completed: u64,
    /// Reassemblies abandoned to a stall or total timeout.
    pub fragment_timeouts: u64,
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

impl PeerStats {
    counter_fns! {
        record_request_sent => requests_sent,
        record_request_received => requests_received,
        record_response_sent => responses_sent,
        record_response_received => responses_received,
        record_receive_error => receive_errors,
        record_fragment_sent => fragments_sent,
        record_fragment_received => fragments_received,
        record_reassembly_completed => reassemblies_completed,
        record_fragment_timeout => fragment_timeouts,
    }

    /// Read every counter at once.
    #[must_use]
    pub fn snapshot(&self) -> PeerStatsSnapshot {
        PeerStatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            fragments_sent: self.fragments_sent.load(Ordering::Relaxed),
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            reassemblies_completed: self.reassemblies_completed.load(Ordering::Relaxed),
            fragment_timeouts: self.fragment_timeouts.load(Ordering::Relaxed),
        }
    }
}
