//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use provider_balancer::{
    BalancerError, LoadBalancer, ProbeSettings, Provider, ProviderRef, Result, SimpleProvider,
    StrategyKind,
};

/// Max concurrent requests one provider handles.
pub const MAX_CONCURRENT: usize = 10;
/// Simulated processing time of one request.
pub const PROCESSING_TIME: Duration = Duration::from_secs(5);
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Long enough for the first probe tick to land, including timeouts.
pub const PROBE_CYCLE: Duration = Duration::from_secs(8);

/// Provider that counts how often it was probed.
#[derive(Debug)]
pub struct CheckCountProvider {
    inner: SimpleProvider,
    checks: AtomicUsize,
}

impl CheckCountProvider {
    pub fn new(id: &str, max_concurrency: usize) -> Self {
        Self {
            inner: SimpleProvider::with_id(id, max_concurrency, PROCESSING_TIME).unwrap(),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for CheckCountProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn serve(&self) -> Result<String> {
        self.inner.serve().await
    }

    async fn check_alive(&self) -> Result<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.check_alive().await
    }

    fn current_load(&self) -> f64 {
        self.inner.current_load()
    }

    fn set_availability(&self, available: bool) {
        self.inner.set_availability(available)
    }
}

pub fn provider_names(count: usize, offset: usize) -> Vec<String> {
    (offset..offset + count).map(|i| format!("provider{i}")).collect()
}

pub fn simple_providers(names: &[String]) -> Vec<Arc<SimpleProvider>> {
    names
        .iter()
        .map(|n| {
            Arc::new(SimpleProvider::with_id(n.as_str(), MAX_CONCURRENT, PROCESSING_TIME).unwrap())
        })
        .collect()
}

pub fn counting_providers(
    names: &[String],
    max_concurrency: usize,
) -> Vec<Arc<CheckCountProvider>> {
    names
        .iter()
        .map(|n| Arc::new(CheckCountProvider::new(n, max_concurrency)))
        .collect()
}

pub fn as_refs<P: Provider + 'static>(providers: &[Arc<P>]) -> Vec<ProviderRef> {
    providers.iter().map(|p| p.clone() as ProviderRef).collect()
}

pub fn balancer(strategy: StrategyKind) -> LoadBalancer {
    let settings = ProbeSettings::new(PROBE_INTERVAL, PROBE_TIMEOUT).unwrap();
    LoadBalancer::new(settings, strategy).unwrap()
}

/// Dispatch `count` requests and tally responses per provider.
pub async fn dispatch_many(
    balancer: &LoadBalancer,
    count: usize,
) -> std::result::Result<HashMap<String, usize>, BalancerError> {
    let mut responses = HashMap::new();
    for _ in 0..count {
        let id = balancer.dispatch().await?;
        *responses.entry(id).or_insert(0) += 1;
    }
    Ok(responses)
}
