//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BalancerError, Result};
use crate::health::ProbeSettings;
use crate::load_balancer::StrategyKind;
use crate::provider::SimpleProvider;

/// Root configuration for the balancer demo.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Liveness probe timing.
    pub probe: ProbeConfig,

    /// Selection strategy.
    pub strategy: StrategyKind,

    /// Simulated providers to register at startup.
    pub providers: Vec<ProviderConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Liveness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds. Must be below the interval.
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 2_000,
        }
    }
}

impl ProbeConfig {
    pub fn to_settings(&self) -> Result<ProbeSettings> {
        ProbeSettings::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

/// Simulated provider definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Identity; a random UUID when omitted.
    #[serde(default)]
    pub id: Option<String>,

    /// Maximum concurrent requests.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Processing time of one request in milliseconds.
    #[serde(default = "default_processing_time_ms")]
    pub processing_time_ms: i64,
}

fn default_max_concurrency() -> usize {
    10
}

fn default_processing_time_ms() -> i64 {
    5_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: None,
            max_concurrency: default_max_concurrency(),
            processing_time_ms: default_processing_time_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn build(&self) -> Result<SimpleProvider> {
        let processing_time = u64::try_from(self.processing_time_ms)
            .map(Duration::from_millis)
            .map_err(|_| {
                BalancerError::InvalidConfiguration(format!(
                    "processing time must not be negative, got {}ms",
                    self.processing_time_ms
                ))
            })?;

        match &self.id {
            Some(id) => SimpleProvider::with_id(id.clone(), self.max_concurrency, processing_time),
            None => SimpleProvider::new(self.max_concurrency, processing_time),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
