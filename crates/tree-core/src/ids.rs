//! Monotonic ids, wall-clock timestamps, and connection uuids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new monotonic identifier (starts at 1), used for the event-ish
/// bookkeeping counters inside peer sessions (e.g. fragment sequencing in
/// tests and tooling).
pub fn next_monotonic_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Milliseconds since the UNIX epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// A fresh connection UUID, used as the peer-session tiebreaker when two
/// peers discover each other simultaneously (lexicographically lower
/// initiates).
#[must_use]
pub fn new_connection_id() -> String {
    Uuid::new_v4().to_string()
}
