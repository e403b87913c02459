//! The load balancer engine.
//!
//! # Responsibilities
//! - Own the provider registry and the liveness prober
//! - Register, add and remove providers
//! - Dispatch requests through the configured strategy

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{BalancerError, Result};
use crate::health::{LivenessProber, ProbeSettings, ProberHandle};
use crate::load_balancer::{Registry, Strategy, StrategyKind};
use crate::observability::metrics;
use crate::provider::ProviderRef;

/// Point-in-time view of one registered provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub streak: i64,
    pub load: f64,
    pub eligible: bool,
}

/// Client-side load balancer over a set of providers.
///
/// Construction starts the liveness prober on the current Tokio runtime; it
/// runs until [`LoadBalancer::shutdown`] is awaited or the balancer is dropped.
#[derive(Debug)]
pub struct LoadBalancer {
    registry: Arc<Registry>,
    strategy: Box<dyn Strategy>,
    /// Read while a strategy picks from a snapshot, written while the provider
    /// set is replaced and the strategy reset.
    selection: RwLock<()>,
    settings: ProbeSettings,
    prober: Option<ProberHandle>,
}

impl LoadBalancer {
    /// Create a balancer using one of the built-in strategies.
    pub fn new(settings: ProbeSettings, strategy: StrategyKind) -> Result<Self> {
        Self::with_strategy(settings, strategy.build())
    }

    /// Create a balancer with a custom strategy.
    pub fn with_strategy(settings: ProbeSettings, strategy: Box<dyn Strategy>) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BalancerError::InvalidConfiguration(
                "load balancer must be created inside a Tokio runtime".to_string(),
            ));
        }

        let registry = Arc::new(Registry::new());
        let prober = LivenessProber::new(registry.clone(), settings).spawn();

        tracing::info!(strategy = strategy.name(), "Load balancer started");

        Ok(Self {
            registry,
            strategy,
            selection: RwLock::new(()),
            settings,
            prober: Some(prober),
        })
    }

    /// Replace all providers. Streaks and the strategy position start over.
    pub fn register_providers(&self, providers: Vec<ProviderRef>) -> Result<()> {
        let count = providers.len();
        {
            let _selection = self.selection.write().unwrap_or_else(PoisonError::into_inner);
            self.registry.replace(providers)?;
            self.strategy.reset();
        }
        tracing::info!(providers = count, "Providers registered");
        Ok(())
    }

    /// Register one more provider at the end of the rotation.
    pub fn add_provider(&self, provider: ProviderRef) -> Result<()> {
        let id = provider.id().to_string();
        self.registry.add(provider)?;
        tracing::info!(provider = %id, "Provider added");
        Ok(())
    }

    /// Unregister a provider by identity.
    pub fn remove_provider(&self, id: &str) -> Result<ProviderRef> {
        let provider = self.registry.remove(id)?;
        tracing::info!(provider = %id, "Provider removed");
        Ok(provider)
    }

    /// Pick a provider and forward one request to it.
    ///
    /// Not time-bounded: if the chosen provider is forced unavailable between
    /// selection and the call, this waits for it.
    pub async fn dispatch(&self) -> Result<String> {
        let strategy = self.strategy.name();
        let entry = {
            let _selection = self.selection.read().unwrap_or_else(PoisonError::into_inner);
            let snapshot = self.registry.snapshot();
            if snapshot.is_empty() {
                metrics::record_dispatch(strategy, "no_providers");
                return Err(BalancerError::ProviderNotFound(
                    "no providers registered".to_string(),
                ));
            }

            let Some(entry) = self.strategy.next_provider(&snapshot) else {
                tracing::debug!(strategy, providers = snapshot.len(), "No eligible provider");
                for e in snapshot.iter() {
                    tracing::trace!(
                        provider = %e.id(),
                        streak = e.streak(),
                        load = e.provider().current_load(),
                        "Provider status"
                    );
                }
                metrics::record_dispatch(strategy, "max_load");
                return Err(BalancerError::MaxLoad);
            };
            entry
        };

        let provider = entry.provider().clone();
        match provider.serve().await {
            Ok(id) => {
                metrics::record_dispatch(strategy, "ok");
                metrics::record_provider_load(&id, provider.current_load());
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(provider = %provider.id(), error = %e, "Provider failed to serve");
                metrics::record_dispatch(strategy, "error");
                Err(e)
            }
        }
    }

    /// Status of every registered provider, in registration order.
    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.registry
            .snapshot()
            .iter()
            .map(|e| {
                let load = e.provider().current_load();
                let streak = e.streak();
                ProviderStatus {
                    id: e.id().to_string(),
                    streak,
                    load,
                    eligible: streak >= 0 && load < 1.0,
                }
            })
            .collect()
    }

    /// Identities of providers whose streak is non-negative.
    pub fn alive_providers(&self) -> Vec<String> {
        self.registry
            .snapshot()
            .iter()
            .filter(|e| e.is_alive())
            .map(|e| e.id().to_string())
            .collect()
    }

    pub fn streak(&self, id: &str) -> Option<i64> {
        self.registry.get(id).map(|e| e.streak())
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        self.settings
    }

    /// Stop the prober and wait for its outstanding probes to be cancelled.
    pub async fn shutdown(mut self) {
        if let Some(prober) = self.prober.take() {
            prober.stop().await;
        }
        tracing::info!("Load balancer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::round_robin::RoundRobin;
    use crate::load_balancer::ProviderEntry;
    use crate::provider::{Provider, SimpleProvider};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn settings() -> ProbeSettings {
        ProbeSettings::new(Duration::from_secs(5), Duration::from_secs(2)).unwrap()
    }

    fn providers(count: usize) -> Vec<Arc<SimpleProvider>> {
        (0..count)
            .map(|i| {
                Arc::new(
                    SimpleProvider::with_id(format!("provider{i}"), 10, Duration::from_secs(5))
                        .unwrap(),
                )
            })
            .collect()
    }

    fn as_refs(providers: &[Arc<SimpleProvider>]) -> Vec<ProviderRef> {
        providers.iter().map(|p| p.clone() as ProviderRef).collect()
    }

    #[test]
    fn test_requires_runtime() {
        let err = LoadBalancer::new(settings(), StrategyKind::RoundRobin).unwrap_err();
        assert!(matches!(err, BalancerError::InvalidConfiguration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_empty_registry() {
        let lb = LoadBalancer::new(settings(), StrategyKind::Random).unwrap();
        let err = lb.dispatch().await.unwrap_err();
        assert!(matches!(err, BalancerError::ProviderNotFound(_)));
        lb.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_resets_cursor() {
        let lb = LoadBalancer::new(settings(), StrategyKind::RoundRobin).unwrap();
        let ps = providers(3);
        lb.register_providers(as_refs(&ps)).unwrap();

        assert_eq!(lb.dispatch().await.unwrap(), "provider0");
        assert_eq!(lb.dispatch().await.unwrap(), "provider1");

        lb.register_providers(as_refs(&providers(3))).unwrap();
        assert_eq!(lb.dispatch().await.unwrap(), "provider0");
        lb.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_remove_errors() {
        let lb = LoadBalancer::new(settings(), StrategyKind::RoundRobin).unwrap();
        let ps = providers(2);
        lb.register_providers(as_refs(&ps)).unwrap();

        let err = lb.add_provider(ps[0].clone()).unwrap_err();
        assert_eq!(err, BalancerError::ProviderAlreadyRegistered("provider0".into()));

        let err = lb.remove_provider("missing").unwrap_err();
        assert_eq!(err, BalancerError::ProviderNotFound("missing".into()));

        lb.remove_provider("provider0").unwrap();
        assert_eq!(lb.len(), 1);
        assert_eq!(lb.streak("provider1"), Some(0));
        lb.shutdown().await;
    }

    /// Round robin that parks inside `next_provider` when armed.
    #[derive(Debug)]
    struct ParkedRoundRobin {
        inner: RoundRobin,
        armed: Arc<AtomicBool>,
        barrier: Arc<Barrier>,
    }

    impl Strategy for ParkedRoundRobin {
        fn next_provider(&self, entries: &[Arc<ProviderEntry>]) -> Option<Arc<ProviderEntry>> {
            let picked = self.inner.next_provider(entries);
            if self.armed.swap(false, Ordering::AcqRel) {
                self.barrier.wait();
                self.barrier.wait();
            }
            picked
        }

        fn reset(&self) {
            self.inner.reset();
        }

        fn name(&self) -> &'static str {
            "parked_round_robin"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_register_waits_for_in_progress_pick() {
        let armed = Arc::new(AtomicBool::new(true));
        let barrier = Arc::new(Barrier::new(2));
        let strategy = ParkedRoundRobin {
            inner: RoundRobin::new(),
            armed: armed.clone(),
            barrier: barrier.clone(),
        };
        let lb = Arc::new(LoadBalancer::with_strategy(settings(), Box::new(strategy)).unwrap());
        lb.register_providers(as_refs(&providers(3))).unwrap();

        // Pick index 0 from the old set and hold there.
        let dispatcher = {
            let lb = lb.clone();
            tokio::spawn(async move { lb.dispatch().await })
        };
        barrier.wait();

        let replacer = {
            let lb = lb.clone();
            std::thread::spawn(move || lb.register_providers(as_refs(&providers(3))))
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!replacer.is_finished());

        barrier.wait();
        assert_eq!(dispatcher.await.unwrap().unwrap(), "provider0");
        replacer.join().unwrap().unwrap();

        // The reset happened after the old pick, so rotation restarts at 0.
        assert_eq!(lb.dispatch().await.unwrap(), "provider0");
        assert!(!armed.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_statuses_report_load() {
        let lb = LoadBalancer::new(settings(), StrategyKind::RoundRobin).unwrap();
        let ps = providers(2);
        lb.register_providers(as_refs(&ps)).unwrap();
        lb.dispatch().await.unwrap();

        let statuses = lb.provider_statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].id, "provider0");
        assert!((statuses[0].load - 0.1).abs() < 1e-9);
        assert!(statuses.iter().all(|s| s.eligible && s.streak == 0));
        assert_eq!(ps[1].current_load(), 0.0);
        lb.shutdown().await;
    }
}
