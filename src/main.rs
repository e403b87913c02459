//! Load balancer demo.
//!
//! Registers a set of simulated providers, optionally takes some of them
//! down, then fires requests through the balancer and reports where they went.

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

use provider_balancer::config::loader::load_config;
use provider_balancer::config::ProviderConfig;
use provider_balancer::observability::logging;
use provider_balancer::{
    BalancerConfig, BalancerError, LoadBalancer, Provider, ProviderRef, SimpleProvider,
    StrategyKind,
};

#[derive(Parser)]
#[command(name = "provider-balancer")]
#[command(about = "Dispatch simulated requests across providers", long_about = None)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured strategy (round_robin, random).
    #[arg(short, long)]
    strategy: Option<StrategyKind>,

    /// Number of requests to dispatch.
    #[arg(short, long, default_value_t = 20)]
    requests: usize,

    /// Number of tasks dispatching at the same time.
    #[arg(short = 'j', long, default_value_t = 1)]
    concurrency: usize,

    /// Providers to create when the config lists none.
    #[arg(short, long, default_value_t = 5)]
    providers: usize,

    /// Force the first N providers unavailable before dispatching.
    #[arg(short, long, default_value_t = 0)]
    down: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if config.providers.is_empty() {
        config.providers = (0..cli.providers)
            .map(|i| ProviderConfig {
                id: Some(format!("provider{i}")),
                ..ProviderConfig::default()
            })
            .collect();
    }

    logging::init(&config.observability);
    tracing::info!("provider-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = config.probe.to_settings()?;
    let providers = config
        .providers
        .iter()
        .map(|p| p.build().map(Arc::new))
        .collect::<Result<Vec<Arc<SimpleProvider>>, _>>()?;

    tracing::info!(
        strategy = ?config.strategy,
        providers = providers.len(),
        interval_ms = config.probe.interval_ms,
        timeout_ms = config.probe.timeout_ms,
        "Configuration loaded"
    );

    let balancer = LoadBalancer::new(settings, config.strategy)?;
    balancer.register_providers(providers.iter().map(|p| p.clone() as ProviderRef).collect())?;

    if cli.down > 0 {
        for provider in providers.iter().take(cli.down) {
            provider.set_availability(false);
        }
        // Wait for one probe cycle to notice.
        let wait = settings.interval() + settings.timeout();
        tracing::info!(
            down = cli.down,
            wait_ms = wait.as_millis() as u64,
            "Waiting for the prober"
        );
        tokio::time::sleep(wait).await;
        tracing::info!(alive = ?balancer.alive_providers(), "Alive providers");
    }

    let balancer = Arc::new(balancer);
    let shares = request_shares(cli.requests, cli.concurrency);
    let workers = shares.len();
    let mut tasks = JoinSet::new();
    for share in shares {
        let balancer = balancer.clone();
        tasks.spawn(async move {
            let mut results = Vec::with_capacity(share);
            for _ in 0..share {
                results.push(balancer.dispatch().await);
            }
            results
        });
    }
    tracing::info!(requests = cli.requests, workers, "Dispatching");

    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut rejected = 0usize;
    while let Some(joined) = tasks.join_next().await {
        for result in joined? {
            match result {
                Ok(id) => *distribution.entry(id).or_default() += 1,
                Err(BalancerError::MaxLoad) => rejected += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    for (id, count) in &distribution {
        tracing::info!(provider = %id, requests = count, "Distribution");
    }
    for status in balancer.provider_statuses() {
        tracing::info!(
            provider = %status.id,
            streak = status.streak,
            load = status.load,
            eligible = status.eligible,
            "Provider status"
        );
    }
    tracing::info!(served = cli.requests - rejected, rejected, "Dispatch finished");

    for provider in &providers {
        provider.set_availability(true);
    }
    match Arc::try_unwrap(balancer) {
        Ok(balancer) => balancer.shutdown().await,
        Err(_) => tracing::warn!("Balancer still shared; prober stops on drop"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Split `requests` over `concurrency` workers, the first few taking one extra.
fn request_shares(requests: usize, concurrency: usize) -> Vec<usize> {
    let workers = concurrency.clamp(1, requests.max(1));
    (0..workers)
        .map(|worker| requests / workers + usize::from(worker < requests % workers))
        .collect()
}
