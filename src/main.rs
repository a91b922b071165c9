//! Adaptive TTL demo runner.
//!
//! Drives a skewed read-through workload against an in-memory backend
//! wrapped in the adaptive decorator, then prints the collected metrics.
//!
//! Configuration comes from `ADAPTIVE_TTL_*` environment variables; set
//! `RUST_LOG=adaptive_ttl=debug` to watch individual TTL decisions.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adaptive_ttl::{
    AdaptiveTtlCache, AdaptiveTtlStrategy, CacheError, DistributedCache, EntryOptions,
    LoadAverageMonitor, MemoryCache, RuleBasedAdaptiveTtlStrategy, Settings, StrategyKind,
    WeightedAdaptiveTtlStrategy,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const WORKERS: usize = 8;
const KEYS: usize = 200;
const ROUNDS: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("adaptive_ttl=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting adaptive TTL demo...");

    let settings = Settings::from_env()?;
    info!("Configuration loaded successfully");
    info!("Strategy: {:?}", settings.strategy);

    let strategy: Arc<dyn AdaptiveTtlStrategy> = match settings.strategy {
        StrategyKind::RuleBased => Arc::new(RuleBasedAdaptiveTtlStrategy::new(settings.ttl.clone())?),
        StrategyKind::Weighted => Arc::new(WeightedAdaptiveTtlStrategy::new(settings.ttl.base.clone())?),
    };

    let backend = Arc::new(MemoryCache::new("demo", settings.backend.clone()));
    let cache = Arc::new(AdaptiveTtlCache::new(
        backend,
        strategy,
        Arc::new(LoadAverageMonitor::new()),
        settings.cache.clone(),
    )?);

    tokio::select! {
        result = run_workload(Arc::clone(&cache)) => result?,
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, stopping workload"),
    }

    let metrics = cache.metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    cache.dispose_async().await;
    info!("Done");

    Ok(())
}

/// Every worker walks the key space each round; low keys are hot, high keys cold.
async fn run_workload(cache: Arc<AdaptiveTtlCache>) -> Result<(), CacheError> {
    for round in 0..ROUNDS {
        let workers = (0..WORKERS).map(|worker| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { worker_round(&cache, worker, round).await })
        });

        for joined in join_all(workers).await {
            match joined {
                Ok(result) => result?,
                Err(e) => warn!("Worker task failed: {}", e),
            }
        }

        if round % 10 == 9 {
            let metrics = cache.metrics();
            info!(
                "Round {}: {} calculations, {} tracked keys",
                round + 1,
                metrics.total_calculations,
                cache.tracked_keys()
            );
        }
    }
    Ok(())
}

async fn worker_round(cache: &AdaptiveTtlCache, worker: usize, round: usize) -> Result<(), CacheError> {
    for index in (worker..KEYS).step_by(WORKERS) {
        // Key `i` is touched every `i / 20 + 1` rounds.
        if round % (index / 20 + 1) != 0 {
            continue;
        }

        let key = format!("item:{index}");
        if cache.get(&key).await?.is_some() {
            continue;
        }

        // Simulated recomputation, slower for colder keys.
        tokio::time::sleep(Duration::from_millis(1 + index as u64 / 20)).await;
        let value = format!("value for {key} at round {round}").into_bytes();

        // Every third key asks for an explicit ceiling.
        let options = if index % 3 == 0 {
            EntryOptions::expires_in(Duration::from_secs(120))
        } else {
            EntryOptions::default()
        };
        cache.set(&key, value, options).await?;
    }
    Ok(())
}
