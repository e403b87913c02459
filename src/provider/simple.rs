//! Simulated backend with bounded concurrency.
//!
//! # Responsibilities
//! - Hold one admission slot per request for a fixed processing window
//! - Report load as in-flight requests over max concurrency
//! - Block serve/check while forced unavailable

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::error::{BalancerError, Result};
use crate::provider::gate::AvailabilityGate;
use crate::provider::Provider;

/// In-process provider that simulates work by holding capacity for a while.
#[derive(Debug)]
pub struct SimpleProvider {
    id: String,
    max_concurrency: usize,
    processing_time: Duration,
    inflight: Arc<AtomicUsize>,
    permits: Arc<Semaphore>,
    gate: AvailabilityGate,
}

impl SimpleProvider {
    /// Create a provider with a random UUID identity.
    pub fn new(max_concurrency: usize, processing_time: Duration) -> Result<Self> {
        Self::with_id(Uuid::new_v4().to_string(), max_concurrency, processing_time)
    }

    /// Create a provider with an explicit identity.
    pub fn with_id(
        id: impl Into<String>,
        max_concurrency: usize,
        processing_time: Duration,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(BalancerError::InvalidConfiguration(
                "provider identity cannot be empty".to_string(),
            ));
        }
        if max_concurrency == 0 {
            return Err(BalancerError::InvalidConfiguration(format!(
                "provider '{id}': max concurrency must be greater than zero"
            )));
        }
        if max_concurrency > Semaphore::MAX_PERMITS {
            return Err(BalancerError::InvalidConfiguration(format!(
                "provider '{id}': max concurrency {max_concurrency} exceeds {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(Self {
            id,
            max_concurrency,
            processing_time,
            inflight: Arc::new(AtomicUsize::new(0)),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            gate: AvailabilityGate::new(),
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// Number of requests currently holding an admission slot.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Whether the provider is currently accepting serve/check calls.
    pub fn is_available(&self) -> bool {
        self.gate.is_open()
    }

    /// Wait until the provider is available and a slot is free.
    async fn admit(&self) -> Result<InflightGuard> {
        loop {
            self.gate.wait_open().await;
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BalancerError::ProviderClosed(self.id.clone()))?;

            // Closed while queued on the limiter: hand the slot back and wait again.
            if !self.gate.is_open() {
                tracing::debug!(provider = %self.id, "Provider went unavailable during admission");
                drop(permit);
                continue;
            }

            self.inflight.fetch_add(1, Ordering::AcqRel);
            return Ok(InflightGuard {
                inflight: self.inflight.clone(),
                _permit: permit,
            });
        }
    }
}

#[async_trait]
impl Provider for SimpleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn serve(&self) -> Result<String> {
        let guard = self.admit().await?;

        // The slot is held by the timer task, not by the caller.
        let processing_time = self.processing_time;
        tokio::spawn(async move {
            tokio::time::sleep(processing_time).await;
            drop(guard);
        });

        tracing::trace!(provider = %self.id, inflight = self.inflight(), "Request admitted");
        Ok(self.id.clone())
    }

    async fn check_alive(&self) -> Result<bool> {
        self.gate.wait_open().await;
        Ok(true)
    }

    fn current_load(&self) -> f64 {
        self.inflight() as f64 / self.max_concurrency as f64
    }

    fn set_availability(&self, available: bool) {
        if available {
            if self.gate.open() {
                tracing::info!(provider = %self.id, "Provider available");
            }
        } else if self.gate.close() {
            tracing::info!(provider = %self.id, "Provider forced unavailable");
        } else {
            tracing::warn!(provider = %self.id, "Provider already unavailable");
        }
    }
}

/// Holds one admission slot. Dropping it releases the slot and lowers the load,
/// including when the timer task is cancelled.
#[derive(Debug)]
struct InflightGuard {
    inflight: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}
