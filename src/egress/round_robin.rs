//! Round-robin selection over a fixed-size set.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin selector.
/// Stores an internal counter to rotate through indices.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next index in `0..len`, or `None` for an empty set.
    ///
    /// Single-element sets skip the counter entirely. Concurrent callers may
    /// observe the same tick order in any interleaving; only eventual even
    /// distribution matters.
    pub fn next_index(&self, len: usize) -> Option<usize> {
        match len {
            0 => None,
            1 => Some(0),
            _ => Some(self.counter.fetch_add(1, Ordering::Relaxed) % len),
        }
    }
}
