//! Fragment reassembly for fragmented responses.

use std::collections::HashMap;
use std::time::Instant;

/// In-progress reassembly of one fragmented response.
pub(crate) struct Reassembly {
    fragments: HashMap<u32, Vec<u8>>,
    total: u32,
    first_fragment_at: Instant,
    last_fragment_at: Instant,
}

impl Reassembly {
    pub(crate) fn new(total: u32) -> Self {
        let now = Instant::now();
        Self { fragments: HashMap::new(), total, first_fragment_at: now, last_fragment_at: now }
    }

    pub(crate) fn insert(&mut self, index: u32, data: Vec<u8>) {
        self.last_fragment_at = Instant::now();
        self.fragments.insert(index, data);
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.fragments.len() as u32 >= self.total
    }

    /// Concatenate fragments in index order. Only meaningful once
    /// [`Reassembly::is_complete`] is true.
    pub(crate) fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..self.total {
            if let Some(part) = self.fragments.get(&i) {
                out.extend_from_slice(part);
            }
        }
        out
    }

    pub(crate) fn stalled(&self, stall_timeout: std::time::Duration) -> bool {
        self.last_fragment_at.elapsed() >= stall_timeout
    }

    pub(crate) fn expired(&self, total_timeout: std::time::Duration) -> bool {
        self.first_fragment_at.elapsed() >= total_timeout
    }
}
