//! Weighted-factor TTL strategy.
//!
//! Scores six signals in `[-1, 1]`, combines them with the configured
//! weights and turns the score into a multiplier between 0.5x and 2x.

use std::time::Duration;

use tracing::debug;

use super::learning::{Decision, LearningTable};
use super::{
    AdaptiveTtlContext, AdaptiveTtlOptions, AdaptiveTtlStrategy, CachePerformanceFeedback,
    StrategyMetrics,
};
use crate::error::ConfigError;

/// Score penalty for entries above the large-content threshold.
const LARGE_CONTENT_PENALTY: f64 = 0.1;

/// Metadata key carrying a `[0, 1]` volatility hint.
pub const VOLATILITY_KEY: &str = "volatility";

pub struct WeightedAdaptiveTtlStrategy {
    options: AdaptiveTtlOptions,
    learning: LearningTable,
}

impl WeightedAdaptiveTtlStrategy {
    pub fn new(options: AdaptiveTtlOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let learning = LearningTable::new(options.max_tracked_keys);
        Ok(Self { options, learning })
    }

    pub fn options(&self) -> &AdaptiveTtlOptions {
        &self.options
    }

    pub fn reset(&self) {
        self.learning.reset();
    }

    /// Weighted sum of the factor scores, in `[-1.1, 1]`.
    fn score(&self, ctx: &AdaptiveTtlContext) -> f64 {
        let w = &self.options.weights;
        let t = &self.options.thresholds;

        let hit_rate = {
            let target = self.options.target_hit_rate;
            let span = target.max(1.0 - target).max(f64::EPSILON);
            signed((ctx.hit_rate - target) / span)
        };

        let frequency = {
            let freq = ctx.access_frequency.max(0.0);
            unit_to_signed(freq.ln_1p() / t.max_expected_frequency.ln_1p())
        };

        // Content that has not changed for a while is likely to stay put.
        let temporal = if ctx.base_ttl.is_zero() {
            0.0
        } else {
            let age = (ctx.current_time - ctx.last_update)
                .to_std()
                .unwrap_or(Duration::ZERO);
            unit_to_signed(age.as_secs_f64() / ctx.base_ttl.as_secs_f64())
        };

        let cost = unit_to_signed(
            ctx.miss_cost.as_secs_f64() / t.max_expected_miss_cost.as_secs_f64(),
        );

        let load = if ctx.system_load >= t.high_load {
            -1.0
        } else if ctx.system_load <= t.low_load {
            1.0
        } else {
            let span = t.high_load - t.low_load;
            1.0 - 2.0 * (ctx.system_load - t.low_load) / span
        };

        let volatility = ctx
            .metadata_f64(VOLATILITY_KEY)
            .map(|v| -unit_to_signed(v))
            .unwrap_or(0.0);

        let mut score = w.hit_rate * hit_rate
            + w.access_frequency * frequency
            + w.temporal * temporal
            + w.cost * cost
            + w.load * load
            + w.volatility * volatility;

        if ctx.content_size > t.large_content_threshold {
            score -= LARGE_CONTENT_PENALTY;
        }
        if score.is_finite() { score } else { 0.0 }
    }
}

impl AdaptiveTtlStrategy for WeightedAdaptiveTtlStrategy {
    fn calculate_ttl(&self, context: &AdaptiveTtlContext) -> Duration {
        let score = self.score(context);
        let multiplier = score.exp2() * self.learning.adjustment(&context.key);
        let decision = Decision::scale(&self.options, context.base_ttl, multiplier);

        debug!(
            "Weighted TTL for {}: score {:.3}, base {:?} -> {:?}",
            context.key, score, context.base_ttl, decision.applied_ttl
        );

        self.learning.record_calculation(&context.key, decision);
        decision.applied_ttl
    }

    fn update_strategy(&self, feedback: &CachePerformanceFeedback) {
        self.learning.record_feedback(feedback, &self.options);
    }

    fn metrics(&self) -> StrategyMetrics {
        self.learning.snapshot()
    }
}

impl std::fmt::Debug for WeightedAdaptiveTtlStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedAdaptiveTtlStrategy")
            .field("weights", &self.options.weights)
            .finish()
    }
}

/// Clamp into `[-1, 1]`, mapping NaN to zero.
fn signed(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

/// Map `[0, 1]` onto `[-1, 1]`.
fn unit_to_signed(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0) * 2.0 - 1.0
}
