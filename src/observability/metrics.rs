//! Metrics collection.
//!
//! # Metrics
//! - `balancer_dispatch_total` (counter): dispatches by strategy and outcome
//! - `balancer_probe_total` (counter): probes by provider and outcome
//! - `balancer_provider_streak` (gauge): latest liveness streak per provider
//! - `balancer_provider_load` (gauge): load observed right after a dispatch
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; installing an exporter is up to
//!   the embedding process
//! - Without an installed recorder every call is a no-op

use metrics::{counter, gauge};

/// Record one dispatch attempt.
pub fn record_dispatch(strategy: &'static str, outcome: &'static str) {
    counter!("balancer_dispatch_total", "strategy" => strategy, "outcome" => outcome).increment(1);
}

/// Record one probe result.
pub fn record_probe(provider: &str, outcome: &'static str) {
    counter!("balancer_probe_total", "provider" => provider.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_provider_streak(provider: &str, streak: i64) {
    gauge!("balancer_provider_streak", "provider" => provider.to_string()).set(streak as f64);
}

pub fn record_provider_load(provider: &str, load: f64) {
    gauge!("balancer_provider_load", "provider" => provider.to_string()).set(load);
}
