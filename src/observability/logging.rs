//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honour `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Initialization is idempotent so tests and embedders can call it freely

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Returns `false` if one was already installed.
pub fn init(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.is_ok()
}
