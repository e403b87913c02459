//! Active liveness probing.
//!
//! # Responsibilities
//! - Periodically probe every registered provider, each in its own task
//! - Bound every probe with a timeout
//! - Update the provider's streak from the result

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{BalancerError, Result};
use crate::load_balancer::registry::{ProviderEntry, Registry};
use crate::observability::metrics;

/// Probe interval and per-probe timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    interval: Duration,
    timeout: Duration,
}

impl ProbeSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(BalancerError::InvalidConfiguration(
                "probe interval must be greater than zero".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(BalancerError::InvalidConfiguration(
                "probe timeout must be greater than zero".to_string(),
            ));
        }
        if timeout >= interval {
            return Err(BalancerError::InvalidConfiguration(format!(
                "probe timeout ({timeout:?}) must be shorter than the interval ({interval:?})"
            )));
        }
        Ok(Self { interval, timeout })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive,
    NotAlive,
    Failed(BalancerError),
    TimedOut,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Alive => "alive",
            ProbeOutcome::NotAlive => "not_alive",
            ProbeOutcome::Failed(_) => "error",
            ProbeOutcome::TimedOut => "timeout",
        }
    }
}

/// Background task that keeps registry streaks up to date.
pub struct LivenessProber {
    registry: Arc<Registry>,
    settings: ProbeSettings,
}

impl LivenessProber {
    pub fn new(registry: Arc<Registry>, settings: ProbeSettings) -> Self {
        Self { registry, settings }
    }

    /// Start probing on the current Tokio runtime.
    pub fn spawn(self) -> ProberHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(shutdown_rx));
        ProberHandle {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Probe loop. The first tick fires one interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            timeout_ms = self.settings.timeout.as_millis() as u64,
            "Liveness prober starting"
        );

        let interval = self.settings.interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut probes = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all(&mut probes);
                }
                Some(joined) = probes.join_next(), if !probes.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Probe task panicked");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Liveness prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        // Abort probes still waiting on a provider.
        probes.shutdown().await;
    }

    fn probe_all(&self, probes: &mut JoinSet<ProbeOutcome>) {
        let snapshot = self.registry.snapshot();
        tracing::debug!(providers = snapshot.len(), "Probe tick");

        for entry in snapshot.iter() {
            probes.spawn(probe(entry.clone(), self.settings.timeout));
        }
    }
}

/// Probe one provider and record the result in its entry.
pub async fn probe(entry: Arc<ProviderEntry>, timeout: Duration) -> ProbeOutcome {
    let outcome = match time::timeout(timeout, entry.provider().check_alive()).await {
        Ok(Ok(true)) => ProbeOutcome::Alive,
        Ok(Ok(false)) => ProbeOutcome::NotAlive,
        Ok(Err(e)) => ProbeOutcome::Failed(e),
        Err(_) => ProbeOutcome::TimedOut,
    };

    let streak = if outcome == ProbeOutcome::Alive {
        let streak = entry.record_success();
        if streak == 0 {
            tracing::info!(provider = %entry.id(), "Provider recovered");
        } else {
            tracing::trace!(provider = %entry.id(), streak, "Provider still alive");
        }
        streak
    } else {
        let previous = entry.record_failure();
        match &outcome {
            ProbeOutcome::Failed(e) if previous >= 0 => {
                tracing::warn!(
                    provider = %entry.id(),
                    error = %e,
                    "Probe failed: marking provider unavailable"
                );
            }
            _ if previous >= 0 => {
                tracing::warn!(
                    provider = %entry.id(),
                    outcome = outcome.as_str(),
                    "Provider not responding: marking unavailable"
                );
            }
            _ => {
                tracing::debug!(
                    provider = %entry.id(),
                    outcome = outcome.as_str(),
                    "Provider still unavailable"
                );
            }
        }
        entry.streak()
    };

    metrics::record_probe(entry.id(), outcome.as_str());
    metrics::record_provider_streak(entry.id(), streak);
    outcome
}

/// Handle to a running prober. Dropping it stops the loop.
#[derive(Debug)]
pub struct ProberHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ProberHandle {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and wait until it and its probe tasks are gone.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Liveness prober panicked");
                }
            }
        }
    }
}

impl Drop for ProberHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.shutdown_tx.send(true);
            // Aborting drops the loop's JoinSet, which aborts in-flight probes.
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::registry::UNAVAILABLE;
    use crate::provider::{Provider, ProviderRef, SimpleProvider};

    fn settings() -> ProbeSettings {
        ProbeSettings::new(Duration::from_secs(5), Duration::from_secs(2)).unwrap()
    }

    fn registry_with(providers: &[Arc<SimpleProvider>]) -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        registry
            .replace(providers.iter().map(|p| p.clone() as ProviderRef).collect())
            .unwrap();
        registry
    }

    fn simple(id: &str) -> Arc<SimpleProvider> {
        Arc::new(SimpleProvider::with_id(id, 10, Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_settings_validation() {
        let bad = [
            (Duration::ZERO, Duration::from_secs(1)),
            (Duration::from_secs(5), Duration::ZERO),
            (Duration::from_secs(5), Duration::from_secs(5)),
            (Duration::from_secs(2), Duration::from_secs(5)),
        ];
        for (interval, timeout) in bad {
            let err = ProbeSettings::new(interval, timeout).unwrap_err();
            assert!(matches!(err, BalancerError::InvalidConfiguration(_)));
        }
        assert!(ProbeSettings::new(Duration::from_secs(5), Duration::from_secs(2)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success_and_timeout() {
        let provider = simple("p");
        let registry = registry_with(&[provider.clone()]);
        let entry = registry.get("p").unwrap();

        assert_eq!(probe(entry.clone(), Duration::from_secs(2)).await, ProbeOutcome::Alive);
        assert_eq!(entry.streak(), 1);

        provider.set_availability(false);
        assert_eq!(probe(entry.clone(), Duration::from_secs(2)).await, ProbeOutcome::TimedOut);
        assert_eq!(entry.streak(), UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let provider = simple("p");
        let registry = registry_with(&[provider]);
        let handle = LivenessProber::new(registry.clone(), settings()).spawn();

        time::sleep(Duration::from_secs(4)).await;
        assert_eq!(registry.get("p").unwrap().streak(), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(registry.get("p").unwrap().streak(), 1);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(registry.get("p").unwrap().streak(), 2);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_blocked_probes() {
        let provider = simple("p");
        provider.set_availability(false);
        let registry = registry_with(&[provider]);
        let handle = LivenessProber::new(registry.clone(), settings()).spawn();

        // Tick at 5s, probe blocked on the closed gate.
        time::sleep(Duration::from_millis(5_500)).await;
        assert!(handle.is_running());
        handle.stop().await;

        // Nothing left to time out and write the streak.
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(registry.get("p").unwrap().streak(), 0);
    }
}
