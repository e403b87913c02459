//! Provider capability.
//!
//! # Data Flow
//! ```text
//! dispatch()
//!     → gate.rs (wait while the provider is forced unavailable)
//!     → simple.rs (acquire an admission slot, hold it for the processing window)
//!     → identity returned to the caller
//!
//! prober tick
//!     → check_alive() (same gate, never touches the admission limiter)
//! ```
//!
//! # Design Decisions
//! - The balancer only sees the `Provider` trait; `SimpleProvider` is the
//!   in-process simulated backend used by the demo and the tests
//! - `current_load()` never blocks so strategies can filter cheaply
//! - Unavailability is an explicit gate, not a lock released by another owner

pub mod gate;
pub mod simple;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;

pub use simple::SimpleProvider;

/// A backend capability the balancer can probe and dispatch to.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Stable identity, used as the registry key.
    fn id(&self) -> &str;

    /// Perform one unit of work and return the provider identity.
    async fn serve(&self) -> Result<String>;

    /// Liveness check. Blocks while the provider is forced unavailable.
    async fn check_alive(&self) -> Result<bool>;

    /// In-flight fraction of capacity, in `[0.0, 1.0]`.
    fn current_load(&self) -> f64;

    /// Force the provider available (`true`) or unavailable (`false`).
    fn set_availability(&self, available: bool);
}

/// Shared handle to a provider.
pub type ProviderRef = Arc<dyn Provider>;
