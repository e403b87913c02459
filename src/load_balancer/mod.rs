//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch()
//!     → registry.rs (point-in-time snapshot of providers + streaks)
//!     → Apply selection strategy:
//!         - round_robin.rs (rotate, skipping dead/saturated providers)
//!         - random.rs (uniform pick among eligible providers)
//!     → balancer.rs (serve() on the chosen provider, outside any lock)
//!     → Return provider identity or error
//! ```
//!
//! # Design Decisions
//! - Strategies only read the registry; the prober is the only streak writer
//! - Eligibility = streak >= 0 and load < 1.0, checked before dispatch so a
//!   saturated provider turns into a fast `MaxLoad` instead of a blocked caller
//! - Strategy state (the round-robin cursor) resets when the provider set is replaced

pub mod balancer;
pub mod random;
pub mod registry;
pub mod round_robin;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

pub use balancer::{LoadBalancer, ProviderStatus};
pub use registry::{ProviderEntry, Registry, UNAVAILABLE};

/// Provider selection policy.
pub trait Strategy: Send + Sync + Debug {
    /// Pick an eligible entry, or `None` if every entry is down or saturated.
    fn next_provider(&self, entries: &[Arc<ProviderEntry>]) -> Option<Arc<ProviderEntry>>;

    /// Forget any position state. Called when the provider set is replaced.
    fn reset(&self) {}

    fn name(&self) -> &'static str;
}

/// Built-in strategies, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    Random,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            StrategyKind::Random => Box::new(random::Random::new()),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "round-robin" => Ok(StrategyKind::RoundRobin),
            "random" => Ok(StrategyKind::Random),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}
