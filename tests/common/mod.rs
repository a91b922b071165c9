//! Shared test doubles.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use adaptive_ttl::{
    AdaptiveCacheOptions, AdaptiveTtlCache, AdaptiveTtlContext, AdaptiveTtlStrategy,
    CacheError, CachePerformanceFeedback, DistributedCache, EntryOptions, FixedLoadMonitor,
    StrategyMetrics,
};

/// Strategy that always recommends the same TTL and remembers what it saw.
pub struct FixedStrategy {
    pub ttl: Duration,
    pub contexts: Mutex<Vec<AdaptiveTtlContext>>,
    pub feedback: Mutex<Vec<CachePerformanceFeedback>>,
    calculations: AtomicU64,
}

impl FixedStrategy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            contexts: Mutex::new(Vec::new()),
            feedback: Mutex::new(Vec::new()),
            calculations: AtomicU64::new(0),
        }
    }
}

impl AdaptiveTtlStrategy for FixedStrategy {
    fn calculate_ttl(&self, context: &AdaptiveTtlContext) -> Duration {
        self.calculations.fetch_add(1, Ordering::Relaxed);
        self.contexts.lock().push(context.clone());
        self.ttl
    }

    fn update_strategy(&self, feedback: &CachePerformanceFeedback) {
        self.feedback.lock().push(feedback.clone());
    }

    fn metrics(&self) -> StrategyMetrics {
        StrategyMetrics {
            total_calculations: self.calculations.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}

/// Backend that records the options of every write.
#[derive(Default)]
pub struct RecordingCache {
    pub values: Mutex<HashMap<String, Vec<u8>>>,
    pub writes: Mutex<Vec<(String, EntryOptions)>>,
}

impl RecordingCache {
    pub fn last_write(&self) -> Option<(String, EntryOptions)> {
        self.writes.lock().last().cloned()
    }
}

#[async_trait]
impl DistributedCache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<(), CacheError> {
        self.values.lock().insert(key.to_string(), value);
        self.writes.lock().push((key.to_string(), options));
        Ok(())
    }

    async fn refresh(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Error raised by [`FailingCache`].
#[derive(Debug, thiserror::Error)]
#[error("backend unavailable: {0}")]
pub struct Unavailable(pub &'static str);

/// Backend whose every operation fails.
pub struct FailingCache;

#[async_trait]
impl DistributedCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::backend(Unavailable("get")))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _options: EntryOptions) -> Result<(), CacheError> {
        Err(CacheError::backend(Unavailable("set")))
    }

    async fn refresh(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::backend(Unavailable("refresh")))
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::backend(Unavailable("remove")))
    }
}

/// Backend whose operations on keys prefixed `stall:` never complete.
#[derive(Default)]
pub struct StallingCache {
    pub inner: RecordingCache,
}

impl StallingCache {
    async fn stall_on(key: &str) {
        if key.starts_with("stall:") {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl DistributedCache for StallingCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Self::stall_on(key).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<(), CacheError> {
        Self::stall_on(key).await;
        self.inner.set(key, value, options).await
    }

    async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        Self::stall_on(key).await;
        self.inner.refresh(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        Self::stall_on(key).await;
        self.inner.remove(key).await
    }
}

pub fn decorate(
    inner: Arc<dyn DistributedCache>,
    strategy: Arc<dyn AdaptiveTtlStrategy>,
) -> AdaptiveTtlCache {
    AdaptiveTtlCache::new(
        inner,
        strategy,
        Arc::new(FixedLoadMonitor::new(0.5)),
        AdaptiveCacheOptions::default(),
    )
    .expect("default options are valid")
}
