//! Adaptive TTL decorator.
//!
//! Wraps any [`DistributedCache`] and replaces caller expirations with a TTL
//! computed by an [`AdaptiveTtlStrategy`]. Reads feed hit/miss outcomes back
//! into the strategy; writes build a fresh context from tracked per-key
//! signals and the current system load.
//!
//! The adaptive layer may only shorten a caller's TTL, never extend it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::metadata::MetadataStore;
use super::{AdaptiveCacheOptions, DistributedCache, EntryOptions};
use crate::error::{CacheError, ConfigError, check_key};
use crate::load::{SystemLoadMonitor, normalize_load};
use crate::ttl::{AdaptiveTtlContext, AdaptiveTtlStrategy, CachePerformanceFeedback, StrategyMetrics};

/// Metadata key carrying the number of accesses seen for the key.
pub const ACCESS_COUNT_KEY: &str = "access_count";

const ACTIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    ttl_capped: AtomicU64,
    cleanup_runs: AtomicU64,
    metadata_evicted: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cache decorator applying adaptive TTLs.
///
/// Must be created inside a Tokio runtime; it owns a background task that
/// drops per-key metadata once a key goes idle. Call [`dispose_async`] (or
/// [`dispose`]) to stop it; dropping the cache disposes it as well.
///
/// [`dispose_async`]: AdaptiveTtlCache::dispose_async
/// [`dispose`]: AdaptiveTtlCache::dispose
pub struct AdaptiveTtlCache {
    inner: Arc<dyn DistributedCache>,
    strategy: Arc<dyn AdaptiveTtlStrategy>,
    load_monitor: Arc<dyn SystemLoadMonitor>,
    options: AdaptiveCacheOptions,
    metadata: Arc<MetadataStore>,
    counters: Arc<Counters>,
    state: AtomicU8,
    shutdown: Arc<Notify>,
    disposed: watch::Sender<bool>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
    /// Held for the duration of each background pass; `true` once stopped.
    cleanup_gate: Arc<Mutex<bool>>,
}

impl AdaptiveTtlCache {
    /// Wrap `inner` and start the metadata cleanup task.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn new(
        inner: Arc<dyn DistributedCache>,
        strategy: Arc<dyn AdaptiveTtlStrategy>,
        load_monitor: Arc<dyn SystemLoadMonitor>,
        options: AdaptiveCacheOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;

        let metadata = Arc::new(MetadataStore::new());
        let counters = Arc::new(Counters::default());
        let shutdown = Arc::new(Notify::new());
        let cleanup_gate = Arc::new(Mutex::new(false));

        let cleanup_task = spawn_cleanup(
            Arc::clone(&metadata),
            Arc::clone(&counters),
            Arc::clone(&shutdown),
            Arc::clone(&cleanup_gate),
            options.cleanup_interval,
            options.metadata_idle_timeout,
        );
        info!(
            "Adaptive TTL cache started (cleanup every {:?}, idle timeout {:?})",
            options.cleanup_interval, options.metadata_idle_timeout
        );

        let (disposed, _) = watch::channel(false);

        Ok(Self {
            inner,
            strategy,
            load_monitor,
            options,
            metadata,
            counters,
            state: AtomicU8::new(ACTIVE),
            shutdown,
            disposed,
            cleanup_task: Mutex::new(Some(cleanup_task)),
            cleanup_gate,
        })
    }

    pub fn options(&self) -> &AdaptiveCacheOptions {
        &self.options
    }

    /// `true` once disposal has started.
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) != ACTIVE
    }

    /// Number of keys with tracked metadata.
    pub fn tracked_keys(&self) -> usize {
        self.metadata.len()
    }

    /// Strategy metrics merged with decorator counters (`cache.*`).
    pub fn metrics(&self) -> StrategyMetrics {
        let mut metrics = self.strategy.metrics();
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed) as f64;
        let c = &self.counters;

        let entries = [
            ("cache.gets", load(&c.gets)),
            ("cache.hits", load(&c.hits)),
            ("cache.misses", load(&c.misses)),
            ("cache.sets", load(&c.sets)),
            ("cache.ttl_capped", load(&c.ttl_capped)),
            ("cache.cleanup_runs", load(&c.cleanup_runs)),
            ("cache.metadata_evicted", load(&c.metadata_evicted)),
            ("cache.tracked_keys", self.metadata.len() as f64),
        ];
        metrics
            .custom_metrics
            .extend(entries.into_iter().map(|(name, value)| (name.to_string(), value)));
        metrics
    }

    /// Run one metadata cleanup pass now, returning the number of evicted keys.
    pub fn cleanup_metadata(&self) -> Result<usize, CacheError> {
        self.ensure_active()?;
        Ok(run_cleanup(&self.metadata, &self.counters, self.options.metadata_idle_timeout))
    }

    /// Stop the cleanup task and mark the cache disposed.
    ///
    /// Idempotent. The task is aborted and the cleanup gate closed; a pass
    /// already running on another thread finishes before this returns, and
    /// none starts afterwards.
    pub fn dispose(&self) {
        if !self.begin_dispose() {
            return;
        }
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        self.close_cleanup_gate();
        self.finish_dispose();
    }

    /// Stop the cleanup task, waiting for it to exit.
    ///
    /// Idempotent and safe to call concurrently: callers that lose the race
    /// wait until the winner has finished.
    pub async fn dispose_async(&self) {
        if !self.begin_dispose() {
            let mut rx = self.disposed.subscribe();
            let _ = rx.wait_for(|done| *done).await;
            return;
        }

        // Marks the cache disposed even if this future is dropped mid-wait;
        // the task has already been told to stop.
        let _guard = FinishOnDrop(self);

        let task = self.cleanup_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
            && e.is_panic()
        {
            warn!("Metadata cleanup task panicked: {}", e);
        }
        self.close_cleanup_gate();
    }

    fn close_cleanup_gate(&self) {
        *self.cleanup_gate.lock() = true;
    }

    fn begin_dispose(&self) -> bool {
        let won = self
            .state
            .compare_exchange(ACTIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            info!("Disposing adaptive TTL cache");
            self.shutdown.notify_one();
        }
        won
    }

    fn finish_dispose(&self) {
        self.state.store(DISPOSED, Ordering::Release);
        self.disposed.send_replace(true);
        debug!("Adaptive TTL cache disposed");
    }

    fn ensure_active(&self) -> Result<(), CacheError> {
        if self.is_disposed() {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }

    async fn build_context(&self, key: &str, base_ttl: Duration, content_size: u64) -> AdaptiveTtlContext {
        let signals = self.metadata.signals(key, Instant::now());
        let system_load = normalize_load(self.load_monitor.current_load().await);
        let now = Utc::now();

        AdaptiveTtlContext::new(key, base_ttl)
            .hit_rate(signals.hit_rate)
            .access_frequency(signals.access_frequency)
            .miss_cost(signals.miss_cost)
            .last_update(signals.last_update.unwrap_or(now))
            .content_size(content_size)
            .system_load(system_load)
            .current_time(now)
            .with_metadata(ACCESS_COUNT_KEY, signals.accesses.to_string())
    }
}

#[async_trait]
impl DistributedCache for AdaptiveTtlCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_active()?;
        check_key(key)?;

        let started = Instant::now();
        let value = self.inner.get(key).await?;
        let response_time = started.elapsed();

        let is_hit = value.is_some();
        let observed = self.metadata.record_get(key, is_hit, Instant::now());

        Counters::bump(&self.counters.gets);
        Counters::bump(if is_hit { &self.counters.hits } else { &self.counters.misses });

        let feedback = CachePerformanceFeedback {
            key: key.to_string(),
            is_hit,
            response_time,
            timestamp: Utc::now(),
            current_ttl: observed.current_ttl,
            was_stale: observed.was_stale,
        };
        self.strategy.update_strategy(&feedback);

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<(), CacheError> {
        self.ensure_active()?;
        check_key(key)?;

        let requested = options.requested_ttl(Utc::now());
        let base_ttl = requested.unwrap_or(self.options.default_base_ttl);
        let context = self.build_context(key, base_ttl, value.len() as u64).await;
        let recommended = self.strategy.calculate_ttl(&context);

        let applied = match requested {
            Some(requested) if recommended > requested => {
                debug!(
                    "Capping adaptive TTL for {} at caller TTL {:?} (recommended {:?})",
                    key, requested, recommended
                );
                Counters::bump(&self.counters.ttl_capped);
                requested
            }
            _ => recommended,
        };

        self.inner.set(key, value, options.with_ttl(applied)).await?;

        self.metadata.record_set(key, applied, Instant::now(), Utc::now());
        Counters::bump(&self.counters.sets);
        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_active()?;
        check_key(key)?;
        self.inner.refresh(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_active()?;
        check_key(key)?;
        self.inner.remove(key).await?;
        self.metadata.remove(key);
        Ok(())
    }
}

impl Drop for AdaptiveTtlCache {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for AdaptiveTtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveTtlCache")
            .field("tracked_keys", &self.metadata.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct FinishOnDrop<'a>(&'a AdaptiveTtlCache);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish_dispose();
    }
}

fn run_cleanup(metadata: &MetadataStore, counters: &Counters, idle_timeout: Duration) -> usize {
    let evicted = metadata.evict_idle(idle_timeout, Instant::now());
    Counters::bump(&counters.cleanup_runs);
    if evicted > 0 {
        counters.metadata_evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        debug!("Evicted metadata for {} idle keys", evicted);
    }
    evicted
}

fn spawn_cleanup(
    metadata: Arc<MetadataStore>,
    counters: Arc<Counters>,
    shutdown: Arc<Notify>,
    gate: Arc<Mutex<bool>>,
    interval: Duration,
    idle_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = ticker.tick() => {
                    let stopped = gate.lock();
                    if *stopped {
                        break;
                    }
                    run_cleanup(&metadata, &counters, idle_timeout);
                }
            }
        }
        info!("Metadata cleanup task stopped");
    })
}
