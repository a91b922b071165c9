//! In-memory backend built on Moka.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use super::{CacheConfig, DistributedCache, EntryOptions};
use crate::error::{CacheError, check_key};

/// Value plus the expiration it was written with.
#[derive(Clone)]
struct StoredEntry {
    value: Arc<[u8]>,
    ttl: Option<Duration>,
    sliding: Option<Duration>,
}

/// Per-entry expiration policy.
struct EntryExpiry {
    fallback: Option<Duration>,
}

impl EntryExpiry {
    fn initial(&self, entry: &StoredEntry) -> Option<Duration> {
        match (entry.ttl, entry.sliding) {
            (Some(ttl), Some(sliding)) => Some(ttl.min(sliding)),
            (Some(ttl), None) => Some(ttl),
            (None, Some(sliding)) => Some(sliding),
            (None, None) => self.fallback,
        }
    }
}

impl Expiry<String, StoredEntry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &StoredEntry, _created_at: Instant) -> Option<Duration> {
        self.initial(value)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        value: &StoredEntry,
        read_at: Instant,
        duration_until_expiry: Option<Duration>,
        last_modified_at: Instant,
    ) -> Option<Duration> {
        let Some(sliding) = value.sliding else {
            return duration_until_expiry;
        };
        // A read extends the sliding window but never past the absolute deadline.
        match value.ttl {
            Some(ttl) => {
                let remaining = ttl.saturating_sub(read_at.saturating_duration_since(last_modified_at));
                Some(sliding.min(remaining))
            }
            None => Some(sliding),
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.initial(value)
    }
}

/// A [`DistributedCache`] held in process memory.
///
/// This cache is:
/// - Thread-safe and cheap to clone (clones share the same storage)
/// - Bounded by entry count
/// - Honoring absolute, relative and sliding expiration per entry
#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, StoredEntry>,
    name: Arc<str>,
}

impl MemoryCache {
    /// Create a new cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry { fallback: config.ttl })
            .build();

        Self {
            inner,
            name: name.into(),
        }
    }

    /// Get the number of entries in the cache.
    ///
    /// Note: This may not be perfectly accurate due to concurrent operations.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl DistributedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        check_key(key)?;
        Ok(self.inner.get(key).await.map(|entry| entry.value.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<(), CacheError> {
        check_key(key)?;
        let ttl = options.requested_ttl(Utc::now());

        // Already expired: drop any previous value instead of storing a dead one.
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            debug!("Skipping write of expired entry {} in {}", key, self.name);
            self.inner.invalidate(key).await;
            return Ok(());
        }

        let entry = StoredEntry {
            value: value.into(),
            ttl,
            sliding: options.sliding_expiration,
        };
        self.inner.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn refresh(&self, key: &str) -> Result<(), CacheError> {
        check_key(key)?;
        // Reading re-arms the sliding window via `expire_after_read`.
        let _ = self.inner.get(key).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        check_key(key)?;
        self.inner.invalidate(key).await;
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}
