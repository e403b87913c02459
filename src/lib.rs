//! Client-side load balancer with liveness probing.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller                ┌──────────────────────────────────────────────┐
//!     ──────── dispatch() ─▶│ LoadBalancer                                 │
//!                           │   registry ──▶ strategy ──▶ provider.serve() │
//!                           │      ▲          (round robin / random)       │
//!                           │      │ streaks                               │
//!                           │   prober (interval tick, one task/provider)  │
//!                           │      └────────── provider.check_alive() ─────┼─▶ providers
//!                           └──────────────────────────────────────────────┘
//! ```
//!
//! A provider is alive while its streak is non-negative and eligible while it
//! is also below full load. A failed probe sets the streak to `-2`, so a
//! provider needs two good probes to come back.

pub mod config;
pub mod error;
pub mod health;
pub mod load_balancer;
pub mod observability;
pub mod provider;

pub use config::schema::BalancerConfig;
pub use error::{BalancerError, Result};
pub use health::ProbeSettings;
pub use load_balancer::{LoadBalancer, StrategyKind};
pub use provider::{Provider, ProviderRef, SimpleProvider};
