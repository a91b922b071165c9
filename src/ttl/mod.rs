//! Adaptive TTL decision engine.
//!
//! ## Architecture
//!
//! - `AdaptiveTtlContext` - snapshot of a key's signals at decision time
//! - `CachePerformanceFeedback` - one observed access outcome
//! - `AdaptiveTtlStrategy` - trait turning context into a TTL
//! - `RuleBasedAdaptiveTtlStrategy` - threshold rules with multipliers
//! - `WeightedAdaptiveTtlStrategy` - weighted factor scoring
//!
//! Both strategies share a bounded per-key learning table that nudges future
//! TTLs based on feedback (misses lengthen, stale hits shorten).

mod context;
mod learning;
mod options;
mod rule_based;
mod strategy;
mod weighted;

pub use context::{AdaptiveTtlContext, CachePerformanceFeedback};
pub use options::{
    AdaptiveTtlOptions, ContentRuleOptions, FrequencyRuleOptions, HitRateRuleOptions,
    LoadRuleOptions, RuleBasedTtlOptions, ThresholdOptions, TimeOfDayRuleOptions, WeightOptions,
    WEIGHT_SUM_TOLERANCE,
};
pub use rule_based::RuleBasedAdaptiveTtlStrategy;
pub use strategy::{AdaptiveTtlStrategy, StrategyMetrics};
pub use weighted::{VOLATILITY_KEY, WeightedAdaptiveTtlStrategy};
