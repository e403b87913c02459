//! Random selection among eligible providers.

use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::load_balancer::registry::ProviderEntry;
use crate::load_balancer::Strategy;

/// Uniform random selector.
/// Filters out providers that are down or saturated, then picks one at random.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for Random {
    fn next_provider(&self, entries: &[Arc<ProviderEntry>]) -> Option<Arc<ProviderEntry>> {
        let eligible: Vec<&Arc<ProviderEntry>> =
            entries.iter().filter(|e| e.is_eligible()).collect();

        eligible.choose(&mut rand::thread_rng()).map(|e| Arc::clone(e))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
