//! Strategy configuration.
//!
//! Options are grouped into nested structs so every group can be validated
//! on its own. All groups deserialize with defaults for missing fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tolerance applied when checking that the factor weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Global bounds and learning parameters shared by every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveTtlOptions {
    /// Lower bound for any computed TTL.
    pub min_ttl: Duration,

    /// Upper bound for any computed TTL.
    pub max_ttl: Duration,

    /// Hit rate the strategy tries to keep each key at.
    pub target_hit_rate: f64,

    /// Misses slower than this count as expensive.
    pub target_response_time: Duration,

    /// Step size of the per-key feedback adjustment.
    pub learning_rate: f64,

    /// How much of the previous adjustment survives each feedback.
    pub discount_factor: f64,

    /// Upper bound on keys held in the learning table.
    pub max_tracked_keys: u64,

    pub weights: WeightOptions,

    pub thresholds: ThresholdOptions,
}

impl Default for AdaptiveTtlOptions {
    fn default() -> Self {
        Self {
            min_ttl: Duration::from_secs(5),
            max_ttl: Duration::from_secs(24 * 3600), // 24 hours
            target_hit_rate: 0.8,
            target_response_time: Duration::from_millis(50),
            learning_rate: 0.1,
            discount_factor: 0.9,
            max_tracked_keys: 100_000,
            weights: WeightOptions::default(),
            thresholds: ThresholdOptions::default(),
        }
    }
}

impl AdaptiveTtlOptions {
    /// Set TTL bounds (builder pattern).
    #[must_use]
    pub fn bounds(mut self, min_ttl: Duration, max_ttl: Duration) -> Self {
        self.min_ttl = min_ttl;
        self.max_ttl = max_ttl;
        self
    }

    /// Clamp a duration into `[min_ttl, max_ttl]`.
    pub fn clamp(&self, ttl: Duration) -> Duration {
        ttl.clamp(self.min_ttl, self.max_ttl)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_ttl.is_zero() {
            return Err(ConfigError::out_of_range("min_ttl", "must be greater than zero"));
        }
        if self.max_ttl < self.min_ttl {
            return Err(ConfigError::out_of_range(
                "max_ttl",
                format!("{:?} is below min_ttl {:?}", self.max_ttl, self.min_ttl),
            ));
        }
        check_unit("target_hit_rate", self.target_hit_rate)?;
        if self.target_response_time.is_zero() {
            return Err(ConfigError::out_of_range(
                "target_response_time",
                "must be greater than zero",
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ConfigError::out_of_range(
                "learning_rate",
                format!("{} is outside (0, 1]", self.learning_rate),
            ));
        }
        check_unit("discount_factor", self.discount_factor)?;
        if self.max_tracked_keys == 0 {
            return Err(ConfigError::out_of_range(
                "max_tracked_keys",
                "must be greater than zero",
            ));
        }
        self.weights.validate()?;
        self.thresholds.validate()
    }
}

/// Relative weight of each factor used by the weighted strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightOptions {
    pub hit_rate: f64,
    pub access_frequency: f64,
    pub temporal: f64,
    pub cost: f64,
    pub load: f64,
    pub volatility: f64,
}

impl Default for WeightOptions {
    fn default() -> Self {
        Self {
            hit_rate: 0.3,
            access_frequency: 0.25,
            temporal: 0.15,
            cost: 0.15,
            load: 0.1,
            volatility: 0.05,
        }
    }
}

impl WeightOptions {
    pub fn sum(&self) -> f64 {
        self.hit_rate + self.access_frequency + self.temporal + self.cost + self.load + self.volatility
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("weights.hit_rate", self.hit_rate),
            ("weights.access_frequency", self.access_frequency),
            ("weights.temporal", self.temporal),
            ("weights.cost", self.cost),
            ("weights.load", self.load),
            ("weights.volatility", self.volatility),
        ];
        for (field, weight) in fields {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::out_of_range(
                    field,
                    format!("{weight} must be a non-negative number"),
                ));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::out_of_range(
                "weights",
                format!("weights sum to {sum:.3}, expected 1.0"),
            ));
        }
        Ok(())
    }
}

/// Normalisation points for the context signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOptions {
    /// Load above which TTLs shrink.
    pub high_load: f64,

    /// Load below which TTLs grow.
    pub low_load: f64,

    /// Accesses per minute treated as the top of the frequency scale.
    pub max_expected_frequency: f64,

    pub max_expected_miss_cost: Duration,

    /// Content size in bytes above which an entry counts as large.
    pub large_content_threshold: u64,
}

impl Default for ThresholdOptions {
    fn default() -> Self {
        Self {
            high_load: 0.8,
            low_load: 0.3,
            max_expected_frequency: 1000.0,
            max_expected_miss_cost: Duration::from_millis(1000),
            large_content_threshold: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl ThresholdOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("thresholds.high_load", self.high_load)?;
        check_unit("thresholds.low_load", self.low_load)?;
        if self.low_load > self.high_load {
            return Err(ConfigError::out_of_range(
                "thresholds.low_load",
                format!("{} exceeds high_load {}", self.low_load, self.high_load),
            ));
        }
        if !(self.max_expected_frequency.is_finite() && self.max_expected_frequency > 0.0) {
            return Err(ConfigError::out_of_range(
                "thresholds.max_expected_frequency",
                "must be greater than zero",
            ));
        }
        if self.max_expected_miss_cost.is_zero() {
            return Err(ConfigError::out_of_range(
                "thresholds.max_expected_miss_cost",
                "must be greater than zero",
            ));
        }
        if self.large_content_threshold == 0 {
            return Err(ConfigError::out_of_range(
                "thresholds.large_content_threshold",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Options for the rule-based strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleBasedTtlOptions {
    #[serde(flatten)]
    pub base: AdaptiveTtlOptions,

    pub hit_rate: HitRateRuleOptions,

    pub frequency: FrequencyRuleOptions,

    pub load: LoadRuleOptions,

    pub time_of_day: TimeOfDayRuleOptions,

    pub content: ContentRuleOptions,
}

impl RuleBasedTtlOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base.validate()?;
        self.hit_rate.validate()?;
        self.frequency.validate()?;
        self.load.validate()?;
        self.time_of_day.validate()?;
        self.content.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitRateRuleOptions {
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub high_multiplier: f64,
    pub low_multiplier: f64,
}

impl Default for HitRateRuleOptions {
    fn default() -> Self {
        Self {
            high_threshold: 0.9,
            low_threshold: 0.5,
            high_multiplier: 1.5,
            low_multiplier: 0.7,
        }
    }
}

impl HitRateRuleOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("hit_rate.high_threshold", self.high_threshold)?;
        check_unit("hit_rate.low_threshold", self.low_threshold)?;
        if self.low_threshold > self.high_threshold {
            return Err(ConfigError::out_of_range(
                "hit_rate.low_threshold",
                "exceeds high_threshold",
            ));
        }
        check_multiplier("hit_rate.high_multiplier", self.high_multiplier)?;
        check_multiplier("hit_rate.low_multiplier", self.low_multiplier)
    }
}

/// Frequency thresholds are in accesses per minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyRuleOptions {
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub high_multiplier: f64,
    pub low_multiplier: f64,
}

impl Default for FrequencyRuleOptions {
    fn default() -> Self {
        Self {
            high_threshold: 100.0,
            low_threshold: 1.0,
            high_multiplier: 1.4,
            low_multiplier: 0.8,
        }
    }
}

impl FrequencyRuleOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.low_threshold.is_finite() && self.low_threshold >= 0.0) {
            return Err(ConfigError::out_of_range(
                "frequency.low_threshold",
                "must be a non-negative number",
            ));
        }
        if !(self.high_threshold.is_finite() && self.high_threshold >= self.low_threshold) {
            return Err(ConfigError::out_of_range(
                "frequency.high_threshold",
                "must be at least low_threshold",
            ));
        }
        check_multiplier("frequency.high_multiplier", self.high_multiplier)?;
        check_multiplier("frequency.low_multiplier", self.low_multiplier)
    }
}

/// Miss-cost and system-load rules.
///
/// The load thresholds themselves live in [`ThresholdOptions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadRuleOptions {
    pub expensive_miss_threshold: Duration,
    pub expensive_miss_multiplier: f64,
    pub high_load_multiplier: f64,
    pub low_load_multiplier: f64,
}

impl Default for LoadRuleOptions {
    fn default() -> Self {
        Self {
            expensive_miss_threshold: Duration::from_millis(100),
            expensive_miss_multiplier: 1.3,
            high_load_multiplier: 0.7,
            low_load_multiplier: 1.2,
        }
    }
}

impl LoadRuleOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_multiplier("load.expensive_miss_multiplier", self.expensive_miss_multiplier)?;
        check_multiplier("load.high_load_multiplier", self.high_load_multiplier)?;
        check_multiplier("load.low_load_multiplier", self.low_load_multiplier)
    }
}

/// Hour-of-day windows, evaluated in UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeOfDayRuleOptions {
    pub peak_hours_start: u32,
    pub peak_hours_end: u32,
    pub peak_multiplier: f64,
    pub off_hours_start: u32,
    pub off_hours_end: u32,
    pub off_hours_multiplier: f64,
}

impl Default for TimeOfDayRuleOptions {
    fn default() -> Self {
        Self {
            peak_hours_start: 9,
            peak_hours_end: 17,
            peak_multiplier: 1.2,
            off_hours_start: 22,
            off_hours_end: 6,
            off_hours_multiplier: 0.8,
        }
    }
}

impl TimeOfDayRuleOptions {
    pub fn is_peak(&self, hour: u32) -> bool {
        hour >= self.peak_hours_start && hour < self.peak_hours_end
    }

    /// Off-hours wrap around midnight.
    pub fn is_off_hours(&self, hour: u32) -> bool {
        hour >= self.off_hours_start || hour < self.off_hours_end
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let hours = [
            ("time_of_day.peak_hours_start", self.peak_hours_start),
            ("time_of_day.peak_hours_end", self.peak_hours_end),
            ("time_of_day.off_hours_start", self.off_hours_start),
            ("time_of_day.off_hours_end", self.off_hours_end),
        ];
        for (field, hour) in hours {
            if hour > 23 {
                return Err(ConfigError::out_of_range(field, format!("hour {hour} is not in 0..=23")));
            }
        }
        if self.peak_hours_start >= self.peak_hours_end {
            return Err(ConfigError::out_of_range(
                "time_of_day.peak_hours_start",
                "must be before peak_hours_end",
            ));
        }
        check_multiplier("time_of_day.peak_multiplier", self.peak_multiplier)?;
        check_multiplier("time_of_day.off_hours_multiplier", self.off_hours_multiplier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentRuleOptions {
    /// Size in bytes.
    pub large_content_threshold: u64,
    pub large_content_multiplier: f64,
}

impl Default for ContentRuleOptions {
    fn default() -> Self {
        Self {
            large_content_threshold: 1024 * 1024, // 1 MB
            large_content_multiplier: 0.9,
        }
    }
}

impl ContentRuleOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_multiplier("content.large_content_multiplier", self.large_content_multiplier)
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::out_of_range(field, format!("{value} is outside [0, 1]")));
    }
    Ok(())
}

fn check_multiplier(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::out_of_range(field, format!("{value} must be positive")));
    }
    Ok(())
}
