//! Decision inputs and access observations.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Snapshot of one key's signals at decision time.
///
/// Built fresh for every TTL decision and dropped afterwards.
/// Every field defaults to zero or empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptiveTtlContext {
    pub key: String,

    /// TTL requested by the caller, or the configured default.
    pub base_ttl: Duration,

    /// Accesses per minute.
    pub access_frequency: f64,

    /// Observed hit rate in `[0, 1]`.
    pub hit_rate: f64,

    /// When the value was last written.
    pub last_update: DateTime<Utc>,

    /// Value size in bytes.
    pub content_size: u64,

    /// Time it takes to recompute the value after a miss.
    pub miss_cost: Duration,

    /// Normalised load in `[0, 1]`.
    pub system_load: f64,

    /// Clock used by the time-of-day rules.
    pub current_time: DateTime<Utc>,

    /// Extra signals, e.g. `volatility`.
    pub metadata: HashMap<String, String>,
}

impl AdaptiveTtlContext {
    pub fn new(key: impl Into<String>, base_ttl: Duration) -> Self {
        Self {
            key: key.into(),
            base_ttl,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn hit_rate(mut self, hit_rate: f64) -> Self {
        self.hit_rate = hit_rate;
        self
    }

    #[must_use]
    pub fn access_frequency(mut self, access_frequency: f64) -> Self {
        self.access_frequency = access_frequency;
        self
    }

    #[must_use]
    pub fn system_load(mut self, system_load: f64) -> Self {
        self.system_load = system_load;
        self
    }

    #[must_use]
    pub fn miss_cost(mut self, miss_cost: Duration) -> Self {
        self.miss_cost = miss_cost;
        self
    }

    #[must_use]
    pub fn content_size(mut self, content_size: u64) -> Self {
        self.content_size = content_size;
        self
    }

    #[must_use]
    pub fn current_time(mut self, current_time: DateTime<Utc>) -> Self {
        self.current_time = current_time;
        self
    }

    #[must_use]
    pub fn last_update(mut self, last_update: DateTime<Utc>) -> Self {
        self.last_update = last_update;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Read a numeric metadata signal, ignoring unparsable values.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata
            .get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

/// Outcome of one cache read, fed back into the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePerformanceFeedback {
    pub key: String,
    pub is_hit: bool,
    pub response_time: Duration,
    pub timestamp: DateTime<Utc>,

    /// TTL that was applied to the value when it was last written.
    pub current_ttl: Duration,

    /// The hit served a value past its intended freshness window.
    pub was_stale: bool,
}

impl CachePerformanceFeedback {
    pub fn hit(key: impl Into<String>, response_time: Duration) -> Self {
        Self::new(key, true, response_time)
    }

    pub fn miss(key: impl Into<String>, response_time: Duration) -> Self {
        Self::new(key, false, response_time)
    }

    fn new(key: impl Into<String>, is_hit: bool, response_time: Duration) -> Self {
        Self {
            key: key.into(),
            is_hit,
            response_time,
            timestamp: Utc::now(),
            current_ttl: Duration::ZERO,
            was_stale: false,
        }
    }

    #[must_use]
    pub fn current_ttl(mut self, current_ttl: Duration) -> Self {
        self.current_ttl = current_ttl;
        self
    }

    #[must_use]
    pub fn stale(mut self, was_stale: bool) -> Self {
        self.was_stale = was_stale;
        self
    }
}
