//! Rule-based TTL strategy.
//!
//! Each rule contributes an independent multiplier; the product scales the
//! base TTL, the per-key feedback adjustment is applied on top, and the
//! result is clamped into `[min_ttl, max_ttl]`.

use std::time::Duration;

use chrono::Timelike;
use tracing::debug;

use super::learning::{Decision, LearningTable};
use super::{
    AdaptiveTtlContext, AdaptiveTtlStrategy, CachePerformanceFeedback, RuleBasedTtlOptions,
    StrategyMetrics,
};
use crate::error::ConfigError;

pub struct RuleBasedAdaptiveTtlStrategy {
    options: RuleBasedTtlOptions,
    learning: LearningTable,
}

impl RuleBasedAdaptiveTtlStrategy {
    /// Create a strategy after validating `options`.
    pub fn new(options: RuleBasedTtlOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let learning = LearningTable::new(options.base.max_tracked_keys);
        Ok(Self { options, learning })
    }

    pub fn options(&self) -> &RuleBasedTtlOptions {
        &self.options
    }

    /// Forget all per-key history and counters.
    pub fn reset(&self) {
        self.learning.reset();
    }

    /// Product of every rule that fires for `ctx`.
    fn rule_multiplier(&self, ctx: &AdaptiveTtlContext) -> f64 {
        let opts = &self.options;
        let mut multiplier = 1.0;

        if ctx.hit_rate > opts.hit_rate.high_threshold {
            multiplier *= opts.hit_rate.high_multiplier;
        } else if ctx.hit_rate < opts.hit_rate.low_threshold {
            multiplier *= opts.hit_rate.low_multiplier;
        }

        if ctx.access_frequency > opts.frequency.high_threshold {
            multiplier *= opts.frequency.high_multiplier;
        } else if ctx.access_frequency < opts.frequency.low_threshold {
            multiplier *= opts.frequency.low_multiplier;
        }

        if ctx.miss_cost > opts.load.expensive_miss_threshold {
            multiplier *= opts.load.expensive_miss_multiplier;
        }

        let thresholds = &opts.base.thresholds;
        if ctx.system_load > thresholds.high_load {
            multiplier *= opts.load.high_load_multiplier;
        } else if ctx.system_load < thresholds.low_load {
            multiplier *= opts.load.low_load_multiplier;
        }

        // Peak and off-hours windows don't overlap, so both checks are independent.
        let hour = ctx.current_time.hour();
        if opts.time_of_day.is_peak(hour) {
            multiplier *= opts.time_of_day.peak_multiplier;
        }
        if opts.time_of_day.is_off_hours(hour) {
            multiplier *= opts.time_of_day.off_hours_multiplier;
        }

        if ctx.content_size > opts.content.large_content_threshold {
            multiplier *= opts.content.large_content_multiplier;
        }

        multiplier
    }
}

impl AdaptiveTtlStrategy for RuleBasedAdaptiveTtlStrategy {
    fn calculate_ttl(&self, context: &AdaptiveTtlContext) -> Duration {
        let multiplier = self.rule_multiplier(context) * self.learning.adjustment(&context.key);
        let decision = Decision::scale(&self.options.base, context.base_ttl, multiplier);

        debug!(
            "TTL for {}: base {:?} x {:.3} -> {:?}{}",
            context.key,
            context.base_ttl,
            multiplier,
            decision.applied_ttl,
            if decision.clamped { " (clamped)" } else { "" }
        );

        self.learning.record_calculation(&context.key, decision);
        decision.applied_ttl
    }

    fn update_strategy(&self, feedback: &CachePerformanceFeedback) {
        self.learning.record_feedback(feedback, &self.options.base);
    }

    fn metrics(&self) -> StrategyMetrics {
        self.learning.snapshot()
    }
}

impl std::fmt::Debug for RuleBasedAdaptiveTtlStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedAdaptiveTtlStrategy")
            .field("min_ttl", &self.options.base.min_ttl)
            .field("max_ttl", &self.options.base.max_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn strategy() -> RuleBasedAdaptiveTtlStrategy {
        let mut options = RuleBasedTtlOptions::default();
        options.base.min_ttl = Duration::from_secs(10);
        options.base.max_ttl = Duration::from_secs(3600);
        RuleBasedAdaptiveTtlStrategy::new(options).unwrap()
    }

    fn assert_secs(ttl: Duration, expected: f64) {
        assert!(
            (ttl.as_secs_f64() - expected).abs() < 1e-3,
            "expected {expected}s, got {ttl:?}"
        );
    }

    /// Context where no rule fires: mid hit rate, moderate traffic and load, evening.
    fn neutral(key: &str) -> AdaptiveTtlContext {
        AdaptiveTtlContext::new(key, Duration::from_secs(300))
            .hit_rate(0.7)
            .access_frequency(10.0)
            .system_load(0.5)
            .current_time(Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap())
    }

    #[test]
    fn test_neutral_context_keeps_base_ttl() {
        let s = strategy();
        assert_secs(s.calculate_ttl(&neutral("k")), 300.0);
    }

    #[test]
    fn test_high_hit_rate_extends() {
        let s = strategy();
        let ttl = s.calculate_ttl(&neutral("k").hit_rate(0.95));
        assert_secs(ttl, 450.0);
    }

    #[test]
    fn test_low_hit_rate_shortens() {
        let s = strategy();
        let ttl = s.calculate_ttl(&neutral("k").hit_rate(0.3));
        assert_secs(ttl, 210.0);
    }

    #[test]
    fn test_high_load_shrinks_and_low_load_grows() {
        let s = strategy();
        let loaded = s.calculate_ttl(&neutral("a").system_load(0.95));
        let idle = s.calculate_ttl(&neutral("b").system_load(0.1));
        assert!(loaded < Duration::from_secs(300));
        assert!(idle > Duration::from_secs(300));
    }

    #[test]
    fn test_expensive_miss_and_large_content() {
        let s = strategy();
        let expensive = s.calculate_ttl(&neutral("a").miss_cost(Duration::from_millis(500)));
        assert_secs(expensive, 390.0);
        let large = s.calculate_ttl(&neutral("b").content_size(2 * 1024 * 1024));
        assert_secs(large, 270.0);
    }

    #[test]
    fn test_time_of_day_windows() {
        let s = strategy();
        let peak = neutral("a").current_time(Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap());
        let night = neutral("b").current_time(Utc.with_ymd_and_hms(2024, 3, 4, 3, 0, 0).unwrap());
        assert_secs(s.calculate_ttl(&peak), 360.0);
        assert_secs(s.calculate_ttl(&night), 240.0);
    }

    #[test]
    fn test_extreme_inputs_are_clamped() {
        let s = strategy();
        let huge = AdaptiveTtlContext::new("a", Duration::from_secs(86_400 * 30)).hit_rate(1.0);
        assert_eq!(s.calculate_ttl(&huge), Duration::from_secs(3600));
        let tiny = AdaptiveTtlContext::new("b", Duration::ZERO);
        assert_eq!(s.calculate_ttl(&tiny), Duration::from_secs(10));

        let metrics = s.metrics();
        let boundary = metrics.custom("boundary_hit_rate").unwrap();
        assert!((boundary - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_track_direction() {
        let s = strategy();
        assert_eq!(s.metrics().total_calculations, 0);
        assert_eq!(s.metrics().average_hit_rate, 0.0);

        s.calculate_ttl(&neutral("a").hit_rate(0.95));
        s.calculate_ttl(&neutral("b").hit_rate(0.3));
        s.calculate_ttl(&neutral("c"));

        let metrics = s.metrics();
        assert_eq!(metrics.total_calculations, 3);
        assert_eq!(metrics.total_ttl_increases, 1);
        assert_eq!(metrics.total_ttl_decreases, 1);
        assert_eq!(metrics.custom("tracked_keys"), Some(3.0));
    }

    #[test]
    fn test_feedback_for_unknown_key_is_noop() {
        let s = strategy();
        s.update_strategy(&CachePerformanceFeedback::miss("ghost", Duration::from_millis(5)));
        assert_eq!(s.metrics(), StrategyMetrics::default());
    }

    #[test]
    fn test_repeated_misses_lengthen_next_ttl() {
        let s = strategy();
        let first = s.calculate_ttl(&neutral("k"));
        for _ in 0..5 {
            s.update_strategy(&CachePerformanceFeedback::miss("k", Duration::from_millis(250)));
        }
        let second = s.calculate_ttl(&neutral("k"));
        assert!(second > first, "{second:?} should exceed {first:?}");
    }

    #[test]
    fn test_invalid_options_rejected() {
        let mut options = RuleBasedTtlOptions::default();
        options.hit_rate.low_threshold = 0.95;
        assert!(RuleBasedAdaptiveTtlStrategy::new(options).is_err());
    }
}
