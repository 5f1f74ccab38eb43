//! The connection-setup side channel the exchange coordinator talks
//! through: hello advertising and the offer/answer/candidate exchange that
//! gets two peers to the point of having a transport. The coordinator
//! depends only on this trait; what carries the bytes (a relay, a queue, a
//! broker) is someone else's problem.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;

/// What an envelope is for. Everything but `Hello` is directed at one peer
/// and must be confidential end-to-end; `Hello` is public.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Broadcast presence advertisement. Idempotent: a newer hello from the
    /// same identity supersedes an older one.
    Hello,
    /// Connection offer directed at a specific identity.
    Offer,
    /// Answer to a received offer.
    Answer,
    /// A single ICE-style connectivity candidate.
    Candidate,
    /// A batch of connectivity candidates.
    Candidates,
}

/// One message on the signaling bus.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// What kind of message this is.
    pub kind: EnvelopeKind,
    /// Target identity. Absent for `Hello`, which has no single recipient.
    pub recipient: Option<String>,
    /// The connection UUID this envelope concerns, used as the
    /// crossed-discovery tiebreaker (lexicographically lower initiates).
    pub peer_id: String,
    /// Opaque connection-setup payload (offer/answer SDP, ICE candidates,
    /// or a hello's advertised identity and pool hint).
    pub payload: Vec<u8>,
}

/// A callback invoked for every inbound envelope.
pub type EnvelopeCallback = Box<dyn Fn(Envelope) + Send + Sync>;

/// The bus the coordinator publishes hellos and offers on, and listens to
/// for anything addressed to the local identity (or broadcast).
#[async_trait]
pub trait SignalingBus: Send + Sync {
    /// Send `envelope` out. For directed kinds the implementation is
    /// responsible for confidentiality; hello is sent in the clear.
    async fn publish(&self, envelope: Envelope);

    /// Register a callback that fires for every envelope addressed to us
    /// (or broadcast, for hello). Registration is permanent for the life
    /// of the bus handle; there is no unsubscribe.
    async fn subscribe(&self, on_envelope: EnvelopeCallback);
}
