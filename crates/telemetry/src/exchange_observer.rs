//! OTel-backed counters for the exchange coordinator's stats snapshot.
//!
//! The coordinator itself only keeps plain atomics (see
//! `exchange::CoordinatorStats`); this module is the optional bridge that
//! turns one snapshot into OTel counter increments, the same way the
//! policy/blob observers in this crate used to bridge their own domains.

use exchange::CoordinatorStatsSnapshot;
use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, UpDownCounter};
use opentelemetry::KeyValue;

struct Instruments {
    hellos_sent: Counter<u64>,
    admissions_accepted: Counter<u64>,
    admissions_rejected: Counter<u64>,
    fetches_resolved: Counter<u64>,
    forwards_served: Counter<u64>,
    interest_pushes: Counter<u64>,
    stale_sessions_dropped: Counter<u64>,
    follows_connections: UpDownCounter<i64>,
    other_connections: UpDownCounter<i64>,
}

static INSTR: OnceCell<Instruments> = OnceCell::new();

fn ensure_instruments() -> &'static Instruments {
    INSTR.get_or_init(|| {
        let meter: Meter = global::meter("hashtree.exchange");
        Instruments {
            hellos_sent: meter.u64_counter("exchange.hellos_sent").init(),
            admissions_accepted: meter.u64_counter("exchange.admissions_accepted").init(),
            admissions_rejected: meter.u64_counter("exchange.admissions_rejected").init(),
            fetches_resolved: meter
                .u64_counter("exchange.fetches_resolved")
                .with_description("Fetches resolved, labeled by source")
                .init(),
            forwards_served: meter.u64_counter("exchange.forwards_served").init(),
            interest_pushes: meter.u64_counter("exchange.interest_pushes").init(),
            stale_sessions_dropped: meter.u64_counter("exchange.stale_sessions_dropped").init(),
            follows_connections: meter.i64_up_down_counter("exchange.follows_connections").init(),
            other_connections: meter.i64_up_down_counter("exchange.other_connections").init(),
        }
    })
}

/// Record one snapshot's deltas relative to the previous snapshot passed
/// in (pass the zeroed value on the first call). Counters only accept
/// monotonic adds, so this diffs the cumulative fields itself.
pub fn observe(previous: &CoordinatorStatsSnapshot, current: &CoordinatorStatsSnapshot) {
    let inst = ensure_instruments();
    let delta = |a: u64, b: u64| a.saturating_sub(b);

    inst.hellos_sent.add(delta(current.hellos_sent, previous.hellos_sent), &[]);
    inst.admissions_accepted.add(delta(current.admissions_accepted, previous.admissions_accepted), &[]);
    inst.admissions_rejected.add(delta(current.admissions_rejected, previous.admissions_rejected), &[]);
    inst.forwards_served.add(delta(current.forwards_served, previous.forwards_served), &[]);
    inst.interest_pushes.add(delta(current.interest_pushes, previous.interest_pushes), &[]);
    inst.stale_sessions_dropped
        .add(delta(current.stale_sessions_dropped, previous.stale_sessions_dropped), &[]);

    inst.fetches_resolved.add(
        delta(current.fetches_resolved_locally, previous.fetches_resolved_locally),
        &[KeyValue::new("source", "local")],
    );
    inst.fetches_resolved.add(
        delta(current.fetches_resolved_by_peer, previous.fetches_resolved_by_peer),
        &[KeyValue::new("source", "peer")],
    );
    inst.fetches_resolved.add(
        delta(current.fetches_resolved_by_fallback, previous.fetches_resolved_by_fallback),
        &[KeyValue::new("source", "fallback")],
    );
    inst.fetches_resolved.add(
        delta(current.fetches_resolved_absent, previous.fetches_resolved_absent),
        &[KeyValue::new("source", "absent")],
    );

    let follows_delta = i64::try_from(current.follows_connections).unwrap_or(i64::MAX)
        - i64::try_from(previous.follows_connections).unwrap_or(i64::MAX);
    inst.follows_connections.add(follows_delta, &[]);
    let other_delta = i64::try_from(current.other_connections).unwrap_or(i64::MAX)
        - i64::try_from(previous.other_connections).unwrap_or(i64::MAX);
    inst.other_connections.add(other_delta, &[]);
}
