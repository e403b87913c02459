//! Round-robin selection with skip.

use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::registry::ProviderEntry;
use crate::load_balancer::Strategy;

/// Round-robin selector.
/// Remembers the last dispatched index and skips providers that are down or full.
#[derive(Debug, Default)]
pub struct RoundRobin {
    /// `None` means "before index 0".
    last: Mutex<Option<usize>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the last provider picked, if any.
    pub fn last_index(&self) -> Option<usize> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Strategy for RoundRobin {
    fn next_provider(&self, entries: &[Arc<ProviderEntry>]) -> Option<Arc<ProviderEntry>> {
        if entries.is_empty() {
            return None;
        }

        let count = entries.len();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let start = last.map_or(0, |idx| idx + 1);

        // One full lap, ending on the previously dispatched index.
        for step in 0..count {
            let index = (start + step) % count;
            let entry = &entries[index];
            if entry.is_eligible() {
                *last = Some(index);
                return Some(entry.clone());
            }
        }
        None
    }

    fn reset(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
