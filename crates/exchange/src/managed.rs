//! A peer session plus the bookkeeping the coordinator needs about it:
//! which pool it counts against and whether it is still alive.

use std::sync::Arc;
use std::time::Instant;

use peer_session::PeerSession;

use crate::config::PoolKind;

/// Lifecycle of one managed session. Only `New` and `Active` are live;
/// the rest are terminal and swept on the next stale-cleanup pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connection setup is still in progress.
    New,
    /// Ready to serve requests.
    Active,
    /// Connection setup or transport failed.
    Failed,
    /// Closed deliberately.
    Closed,
    /// Transport reported a disconnect.
    Disconnected,
}

impl SessionState {
    /// Terminal states are swept by stale cleanup unconditionally.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed | Self::Disconnected)
    }
}

/// One entry in the coordinator's peer map.
pub struct ManagedSession {
    /// The underlying session.
    pub session: Arc<PeerSession>,
    /// Which pool this session counts against.
    pub pool: PoolKind,
    /// Current lifecycle state.
    pub state: SessionState,
    /// When this entry was created, for the `New`-state connection timeout.
    pub created_at: Instant,
}

impl ManagedSession {
    /// Wrap a freshly created session in state `New`.
    pub fn new(session: Arc<PeerSession>, pool: PoolKind) -> Self {
        Self { session, pool, state: SessionState::New, created_at: Instant::now() }
    }

    /// Whether stale cleanup should drop this entry right now.
    #[must_use]
    pub fn is_stale(&self, connection_timeout: std::time::Duration) -> bool {
        self.state.is_terminal() || (self.state == SessionState::New && self.created_at.elapsed() >= connection_timeout)
    }
}
