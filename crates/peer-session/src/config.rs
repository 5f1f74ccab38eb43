//! Per-session configuration and the randomized HTL decrement policy

use rand::Rng;
use tree_core::defaults;

/// Timeouts and bounds for one peer session.
#[derive(Clone, Copy, Debug)]
pub struct PeerSessionConfig {
    /// How long a `request()` call waits for a matching response.
    pub request_timeout_ms: u64,
    /// No new fragment for this long aborts reassembly.
    pub fragment_stall_timeout_ms: u64,
    /// Total time budget for reassembling one response.
    pub fragment_total_timeout_ms: u64,
    /// Payload size above which a response is split into fragments.
    pub fragment_size: usize,
    /// Capacity of the `their_requests` LRU.
    pub their_requests_capacity: usize,
    /// Capacity of the `pending_reassemblies` table.
    pub pending_reassemblies_capacity: usize,
    /// Ceiling HTL value; only affects the decrement rule at the boundary.
    pub max_htl: u8,
    /// Probability a peer decrements HTL when it is exactly `max_htl`.
    pub decrement_at_max_prob: f64,
    /// Probability a peer decrements HTL from `1` to `0`.
    pub decrement_at_min_prob: f64,
}

impl Default for PeerSessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            fragment_stall_timeout_ms: defaults::FRAGMENT_STALL_TIMEOUT_MS,
            fragment_total_timeout_ms: defaults::FRAGMENT_TOTAL_TIMEOUT_MS,
            fragment_size: defaults::FRAGMENT_SIZE,
            their_requests_capacity: defaults::THEIR_REQUESTS_CAPACITY,
            pending_reassemblies_capacity: defaults::PENDING_REASSEMBLIES_CAPACITY,
            max_htl: defaults::MAX_HTL,
            decrement_at_max_prob: defaults::DECREMENT_AT_MAX_PROB,
            decrement_at_min_prob: defaults::DECREMENT_AT_MIN_PROB,
        }
    }
}

/// The two independent coin flips drawn once at connection establishment
/// that determine how this peer decrements HTL at the boundary values,
/// obscuring a request's true source hop from traffic analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerHtlConfig {
    /// Whether this peer decrements HTL when it receives `max_htl`.
    pub decrement_at_max: bool,
    /// Whether this peer decrements HTL from `1` to `0`.
    pub decrement_at_min: bool,
}

impl PeerHtlConfig {
    /// Draw a fresh config from the configured priors.
    pub fn draw(rng: &mut impl Rng, config: &PeerSessionConfig) -> Self {
        Self {
            decrement_at_max: rng.gen_bool(config.decrement_at_max_prob),
            decrement_at_min: rng.gen_bool(config.decrement_at_min_prob),
        }
    }

    /// Apply the per-peer decrement rule to an incoming HTL:
    /// middle values always decrement; the two boundary values decrement
    /// according to this session's drawn coin flips.
    #[must_use]
    pub fn decrement(&self, htl: u8, max_htl: u8) -> u8 {
        if htl == 0 {
            0
        } else if htl == max_htl {
            if self.decrement_at_max { htl - 1 } else { htl }
        } else if htl == 1 {
            if self.decrement_at_min { 0 } else { 1 }
        } else {
            htl - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_values_always_decrement() {
        let cfg = PeerHtlConfig { decrement_at_max: false, decrement_at_min: false };
        assert_eq!(cfg.decrement(5, 10), 4);
    }

    #[test]
    fn max_htl_respects_flag() {
        let decrements = PeerHtlConfig { decrement_at_max: true, decrement_at_min: false };
        let holds = PeerHtlConfig { decrement_at_max: false, decrement_at_min: false };
        assert_eq!(decrements.decrement(10, 10), 9);
        assert_eq!(holds.decrement(10, 10), 10);
    }

    #[test]
    fn min_htl_respects_flag() {
        let decrements = PeerHtlConfig { decrement_at_max: false, decrement_at_min: true };
        let holds = PeerHtlConfig { decrement_at_max: false, decrement_at_min: false };
        assert_eq!(decrements.decrement(1, 10), 0);
        assert_eq!(holds.decrement(1, 10), 1);
    }

    #[test]
    fn zero_stays_zero() {
        let cfg = PeerHtlConfig { decrement_at_max: true, decrement_at_min: true };
        assert_eq!(cfg.decrement(0, 10), 0);
    }
}
