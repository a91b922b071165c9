//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the in-memory backend.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for entries written without any expiration.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set max capacity for cache (builder pattern).
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the fallback time-to-live.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Entries without an expiration never expire.
    #[must_use]
    pub fn no_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }
}

/// Settings of the adaptive decorator itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveCacheOptions {
    /// Base TTL used when the caller gives no expiration.
    pub default_base_ttl: Duration,

    /// Period of the metadata cleanup task.
    pub cleanup_interval: Duration,

    /// Per-key metadata untouched for this long is dropped.
    pub metadata_idle_timeout: Duration,
}

impl Default for AdaptiveCacheOptions {
    fn default() -> Self {
        Self {
            default_base_ttl: Duration::from_secs(1800),    // 30 minutes
            cleanup_interval: Duration::from_secs(300),     // 5 minutes
            metadata_idle_timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl AdaptiveCacheOptions {
    #[must_use]
    pub fn default_base_ttl(mut self, ttl: Duration) -> Self {
        self.default_base_ttl = ttl;
        self
    }

    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    #[must_use]
    pub fn metadata_idle_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_idle_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("default_base_ttl", self.default_base_ttl),
            ("cleanup_interval", self.cleanup_interval),
            ("metadata_idle_timeout", self.metadata_idle_timeout),
        ];
        for (field, value) in fields {
            if value.is_zero() {
                return Err(ConfigError::out_of_range(field, "must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = CacheConfig::with_capacity(42).ttl(Duration::from_secs(9));
        assert_eq!(config.max_capacity, 42);
        assert_eq!(config.ttl, Some(Duration::from_secs(9)));
        assert_eq!(config.no_ttl().ttl, None);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let options = AdaptiveCacheOptions::default().cleanup_interval(Duration::ZERO);
        assert!(matches!(
            options.validate(),
            Err(ConfigError::OutOfRange { field: "cleanup_interval", .. })
        ));
        assert!(AdaptiveCacheOptions::default().validate().is_ok());
    }
}
