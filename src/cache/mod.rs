//! Cache module - adaptive TTL decorator and backends.
//!
//! ## Architecture
//!
//! - `DistributedCache` - async byte-cache contract shared by backends and decorators
//! - `MemoryCache` - Moka-backed in-process backend with per-entry expiry
//! - `AdaptiveTtlCache` - decorator that computes TTLs through a strategy
//!
//! ## Usage
//!
//! ```rust,ignore
//! let inner = Arc::new(MemoryCache::new("sessions", CacheConfig::with_capacity(10_000)));
//! let cache = AdaptiveTtlCache::new(inner, strategy, load_monitor, AdaptiveCacheOptions::default())?;
//!
//! // The adaptive TTL never exceeds the 2 minutes asked for here
//! cache.set("session:42", bytes, EntryOptions::expires_in(Duration::from_secs(120))).await?;
//! let value = cache.get("session:42").await?;
//! ```

mod adaptive;
mod config;
mod memory;
mod metadata;
mod traits;

pub use adaptive::{ACCESS_COUNT_KEY, AdaptiveTtlCache};
pub use config::{AdaptiveCacheOptions, CacheConfig};
pub use memory::MemoryCache;
pub use traits::{DistributedCache, EntryOptions};
