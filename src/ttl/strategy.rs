//! Strategy capability and its metrics snapshot.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use super::{AdaptiveTtlContext, CachePerformanceFeedback};

/// Turns a key's context into a TTL and learns from access outcomes.
///
/// Implementations are shared between concurrent callers, so every method
/// takes `&self` and keeps its state behind interior mutability.
pub trait AdaptiveTtlStrategy: Send + Sync {
    /// Compute a TTL bounded by the strategy's configured min/max.
    fn calculate_ttl(&self, context: &AdaptiveTtlContext) -> Duration;

    /// Record one access outcome. Keys never calculated are ignored.
    fn update_strategy(&self, feedback: &CachePerformanceFeedback);

    /// Immutable snapshot of the aggregate counters.
    fn metrics(&self) -> StrategyMetrics;
}

/// Point-in-time metrics reported by a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyMetrics {
    pub total_calculations: u64,
    pub total_ttl_increases: u64,
    pub total_ttl_decreases: u64,

    /// Mean hit rate over keys that received feedback.
    pub average_hit_rate: f64,

    pub custom_metrics: BTreeMap<String, f64>,
}

impl StrategyMetrics {
    pub fn custom(&self, name: &str) -> Option<f64> {
        self.custom_metrics.get(name).copied()
    }
}
