//! Per-key learning table shared by the strategies.
//!
//! Entries are created on the first TTL calculation for a key and updated by
//! feedback. The table is bounded by `max_tracked_keys`; moka evicts the
//! least recently used keys once the bound is reached, so a freshly
//! calculated key is always admitted. Aggregate counters live in
//! atomics so evictions never roll them back.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use parking_lot::Mutex;
use tracing::debug;

use super::{AdaptiveTtlOptions, CachePerformanceFeedback, StrategyMetrics};

/// Bounds for the feedback-driven TTL adjustment.
const MIN_ADJUSTMENT: f64 = 0.5;
const MAX_ADJUSTMENT: f64 = 2.0;

#[derive(Debug)]
struct KeyLearning {
    calculations: u64,
    hits: u64,
    misses: u64,
    stale_hits: u64,
    bounded_accesses: u64,
    total_response_time: Duration,
    hit_ema: Option<f64>,
    adjustment: f64,
}

impl KeyLearning {
    fn new() -> Self {
        Self {
            calculations: 0,
            hits: 0,
            misses: 0,
            stale_hits: 0,
            bounded_accesses: 0,
            total_response_time: Duration::ZERO,
            hit_ema: None,
            adjustment: 1.0,
        }
    }

    fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    fn apply(&mut self, feedback: &CachePerformanceFeedback, options: &AdaptiveTtlOptions) {
        let discount = options.discount_factor;

        if feedback.is_hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        if feedback.was_stale {
            self.stale_hits += 1;
        }
        let ttl = feedback.current_ttl;
        if !ttl.is_zero() && (ttl <= options.min_ttl || ttl >= options.max_ttl) {
            self.bounded_accesses += 1;
        }
        self.total_response_time = self.total_response_time.saturating_add(feedback.response_time);

        let observed = if feedback.is_hit { 1.0 } else { 0.0 };
        self.hit_ema = Some(match self.hit_ema {
            Some(ema) => discount * ema + (1.0 - discount) * observed,
            None => observed,
        });

        // Stale hits mean the TTL is too long, misses mean it is too short.
        let signal = match (feedback.is_hit, feedback.was_stale) {
            (true, true) => -1.0,
            (true, false) => 0.0,
            (false, _) if feedback.response_time > options.target_response_time => 1.0,
            (false, _) => 0.5,
        };
        let adjustment = 1.0 + discount * (self.adjustment - 1.0) + options.learning_rate * signal;
        self.adjustment = adjustment.clamp(MIN_ADJUSTMENT, MAX_ADJUSTMENT);
    }
}

/// How a calculated TTL relates to the base TTL it started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decision {
    pub base_ttl: Duration,
    pub applied_ttl: Duration,
    /// The candidate had to be clamped to min or max.
    pub clamped: bool,
}

impl Decision {
    /// Scale `base_ttl` by `multiplier` and clamp into the configured bounds.
    pub fn scale(options: &AdaptiveTtlOptions, base_ttl: Duration, multiplier: f64) -> Self {
        let candidate = base_ttl.as_secs_f64() * multiplier;
        let (applied_ttl, clamped) = if !candidate.is_finite() || candidate > options.max_ttl.as_secs_f64() {
            (options.max_ttl, true)
        } else if candidate < options.min_ttl.as_secs_f64() {
            (options.min_ttl, true)
        } else {
            (options.clamp(Duration::from_secs_f64(candidate)), false)
        };

        Self {
            base_ttl,
            applied_ttl,
            clamped,
        }
    }
}

pub(crate) struct LearningTable {
    entries: Cache<String, Arc<Mutex<KeyLearning>>>,
    total_calculations: AtomicU64,
    total_increases: AtomicU64,
    total_decreases: AtomicU64,
    total_boundary_hits: AtomicU64,
}

impl LearningTable {
    pub fn new(max_tracked_keys: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_tracked_keys)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            total_calculations: AtomicU64::new(0),
            total_increases: AtomicU64::new(0),
            total_decreases: AtomicU64::new(0),
            total_boundary_hits: AtomicU64::new(0),
        }
    }

    /// Feedback-derived multiplier for a key, `1.0` without history.
    pub fn adjustment(&self, key: &str) -> f64 {
        self.entries
            .get(key)
            .map(|entry| entry.lock().adjustment)
            .unwrap_or(1.0)
    }

    pub fn record_calculation(&self, key: &str, decision: Decision) {
        self.total_calculations.fetch_add(1, Ordering::Relaxed);
        if decision.applied_ttl > decision.base_ttl {
            self.total_increases.fetch_add(1, Ordering::Relaxed);
        } else if decision.applied_ttl < decision.base_ttl {
            self.total_decreases.fetch_add(1, Ordering::Relaxed);
        }
        if decision.clamped {
            self.total_boundary_hits.fetch_add(1, Ordering::Relaxed);
        }

        if key.is_empty() {
            return;
        }
        let entry = self
            .entries
            .get_with(key.to_string(), || Arc::new(Mutex::new(KeyLearning::new())));
        entry.lock().calculations += 1;
    }

    /// Returns `false` when the key has no calculation history.
    pub fn record_feedback(
        &self,
        feedback: &CachePerformanceFeedback,
        options: &AdaptiveTtlOptions,
    ) -> bool {
        let Some(entry) = self.entries.get(feedback.key.as_str()) else {
            debug!("Ignoring feedback for untracked key {}", feedback.key);
            return false;
        };
        entry.lock().apply(feedback, options);
        true
    }

    pub fn snapshot(&self) -> StrategyMetrics {
        let total_calculations = self.total_calculations.load(Ordering::Relaxed);
        if total_calculations == 0 {
            return StrategyMetrics::default();
        }

        let mut tracked_keys = 0u64;
        let mut keys_with_feedback = 0u64;
        let mut hit_rate_sum = 0.0;
        let mut adjustment_sum = 0.0;
        let mut hits = 0u64;
        let mut accesses = 0u64;
        let mut stale_hits = 0u64;
        let mut bounded_accesses = 0u64;
        let mut response_time = Duration::ZERO;

        for (_, entry) in self.entries.iter() {
            let stats = entry.lock();
            tracked_keys += 1;
            adjustment_sum += stats.adjustment;
            if stats.accesses() > 0 {
                keys_with_feedback += 1;
                hit_rate_sum += stats.hits as f64 / stats.accesses() as f64;
            }
            hits += stats.hits;
            accesses += stats.accesses();
            stale_hits += stats.stale_hits;
            bounded_accesses += stats.bounded_accesses;
            response_time = response_time.saturating_add(stats.total_response_time);
        }

        let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };

        let mut custom_metrics = BTreeMap::new();
        custom_metrics.insert("tracked_keys".to_string(), tracked_keys as f64);
        custom_metrics.insert("total_feedback".to_string(), accesses as f64);
        custom_metrics.insert(
            "average_response_time_ms".to_string(),
            ratio(response_time.as_secs_f64() * 1000.0, accesses as f64),
        );
        custom_metrics.insert(
            "stale_hit_rate".to_string(),
            ratio(stale_hits as f64, hits as f64),
        );
        custom_metrics.insert(
            "boundary_hit_rate".to_string(),
            ratio(
                self.total_boundary_hits.load(Ordering::Relaxed) as f64,
                total_calculations as f64,
            ),
        );
        custom_metrics.insert(
            "bounded_access_rate".to_string(),
            ratio(bounded_accesses as f64, accesses as f64),
        );
        custom_metrics.insert(
            "average_adjustment".to_string(),
            ratio(adjustment_sum, tracked_keys as f64),
        );

        StrategyMetrics {
            total_calculations,
            total_ttl_increases: self.total_increases.load(Ordering::Relaxed),
            total_ttl_decreases: self.total_decreases.load(Ordering::Relaxed),
            average_hit_rate: ratio(hit_rate_sum, keys_with_feedback as f64),
            custom_metrics,
        }
    }

    pub fn reset(&self) {
        self.entries.invalidate_all();
        self.total_calculations.store(0, Ordering::Relaxed);
        self.total_increases.store(0, Ordering::Relaxed);
        self.total_decreases.store(0, Ordering::Relaxed);
        self.total_boundary_hits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(base: u64, applied: u64, clamped: bool) -> Decision {
        Decision {
            base_ttl: Duration::from_secs(base),
            applied_ttl: Duration::from_secs(applied),
            clamped,
        }
    }

    #[test]
    fn test_unknown_key_feedback_is_ignored() {
        let table = LearningTable::new(100);
        let options = AdaptiveTtlOptions::default();
        let applied = table.record_feedback(&CachePerformanceFeedback::hit("ghost", Duration::ZERO), &options);
        assert!(!applied);
        assert_eq!(table.snapshot(), StrategyMetrics::default());
    }

    #[test]
    fn test_misses_raise_adjustment_and_stale_hits_lower_it() {
        let table = LearningTable::new(100);
        let options = AdaptiveTtlOptions::default();
        table.record_calculation("a", decision(60, 60, false));
        table.record_calculation("b", decision(60, 60, false));

        for _ in 0..10 {
            table.record_feedback(&CachePerformanceFeedback::miss("a", Duration::from_millis(200)), &options);
            table.record_feedback(
                &CachePerformanceFeedback::hit("b", Duration::from_millis(1)).stale(true),
                &options,
            );
        }

        assert!(table.adjustment("a") > 1.0);
        assert!(table.adjustment("b") < 1.0);
        assert!(table.adjustment("a") <= MAX_ADJUSTMENT);
        assert!(table.adjustment("b") >= MIN_ADJUSTMENT);
        assert_eq!(table.adjustment("never-seen"), 1.0);
    }

    #[test]
    fn test_snapshot_counts() {
        let table = LearningTable::new(100);
        let options = AdaptiveTtlOptions::default();
        table.record_calculation("a", decision(60, 90, false));
        table.record_calculation("a", decision(60, 30, false));
        table.record_calculation("b", decision(60, 5, true));
        table.record_feedback(&CachePerformanceFeedback::hit("a", Duration::from_millis(10)), &options);
        table.record_feedback(&CachePerformanceFeedback::miss("a", Duration::from_millis(30)), &options);

        let metrics = table.snapshot();
        assert_eq!(metrics.total_calculations, 3);
        assert_eq!(metrics.total_ttl_increases, 1);
        assert_eq!(metrics.total_ttl_decreases, 2);
        assert!((metrics.average_hit_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.custom("tracked_keys"), Some(2.0));
        let avg_ms = metrics.custom("average_response_time_ms").unwrap();
        assert!((avg_ms - 20.0).abs() < 1e-6);
        let boundary = metrics.custom("boundary_hit_rate").unwrap();
        assert!((boundary - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_table_admits_newly_calculated_key() {
        let table = LearningTable::new(2);
        let options = AdaptiveTtlOptions::default();
        for _ in 0..3 {
            table.record_calculation("a", decision(60, 60, false));
            table.record_calculation("b", decision(60, 60, false));
            table.entries.run_pending_tasks();
        }

        table.record_calculation("c", decision(60, 60, false));
        table.entries.run_pending_tasks();

        let applied = table.record_feedback(&CachePerformanceFeedback::miss("c", Duration::from_millis(5)), &options);
        assert!(applied);
        assert_eq!(table.snapshot().custom("tracked_keys"), Some(2.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let table = LearningTable::new(100);
        table.record_calculation("a", decision(60, 90, false));
        table.reset();
        assert_eq!(table.snapshot().total_calculations, 0);
        assert_eq!(table.adjustment("a"), 1.0);
    }
}
