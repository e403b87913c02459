//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Liveness probing (prober.rs):
//!     Periodic timer
//!     → Snapshot the registry
//!     → One probe task per provider, each bounded by the probe timeout
//!     → Update the provider's streak
//!
//! Streak state machine (registry entry):
//!     alive (>= 0) → UNAVAILABLE (-2) on any failed or timed-out probe
//!     -2 → -1 → 0 on consecutive successes
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping: recovery takes two good probes
//! - Probe failures never reach dispatch callers; they only move the streak
//! - Overlapping probes for one provider are last-writer-wins

pub mod prober;

pub use prober::{LivenessProber, ProbeOutcome, ProbeSettings, ProberHandle};
