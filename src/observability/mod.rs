//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! balancer / prober / providers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//! ```
//!
//! # Design Decisions
//! - Structured logging with provider identity as a field
//! - Metrics are cheap (facade calls, no-op without a recorder)

pub mod logging;
pub mod metrics;
