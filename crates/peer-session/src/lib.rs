//! One logical connection to a remote peer: the pending-request table,
//! fragment reassembly, per-peer stats, and the randomized HTL decrement
//! policy drawn at connection establishment.
//!
//! This crate knows nothing about peer discovery, transport setup, or how
//! many peers exist; it is handed an already-open [`PeerTransport`] and a
//! [`ForwardRequests`] implementation and only manages the request/response
//! bookkeeping for that one connection.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod reassembly;
mod session;
mod stats;
mod transport;

pub use config::{PeerHtlConfig, PeerSessionConfig};
pub use session::{CloseReason, PeerId, PeerSession};
pub use stats::{PeerStats, PeerStatsSnapshot};
pub use transport::{ForwardRequests, PeerTransport};
