//! Adaptive TTL - cache decorator with access-driven expirations.
//!
//! Replaces static, caller-supplied expirations with a TTL computed from how
//! a key is actually used: hit rate, access frequency, miss cost, content
//! size, time of day and system load.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `ttl` - Context model, strategies and per-key learning
//! - `cache` - Distributed cache contract, Moka backend and the adaptive decorator
//! - `load` - System load sources
//! - `error` - Error types

pub mod cache;
pub mod config;
pub mod error;
pub mod load;
pub mod ttl;

pub use cache::{AdaptiveCacheOptions, AdaptiveTtlCache, CacheConfig, DistributedCache, EntryOptions, MemoryCache};
pub use config::{Settings, StrategyKind};
pub use error::{BoxError, CacheError, ConfigError};
pub use load::{FixedLoadMonitor, LoadAverageMonitor, SystemLoadMonitor};
pub use ttl::{
    AdaptiveTtlContext, AdaptiveTtlOptions, AdaptiveTtlStrategy, CachePerformanceFeedback,
    RuleBasedAdaptiveTtlStrategy, RuleBasedTtlOptions, StrategyMetrics, WeightedAdaptiveTtlStrategy,
};
