//! Configuration module.
//!
//! Loads configuration from environment variables (and `.env`), then
//! validates every option group before anything is built from it.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{AdaptiveCacheOptions, CacheConfig};
use crate::error::ConfigError;
use crate::ttl::RuleBasedTtlOptions;

/// Prefix shared by all environment variables.
pub const ENV_PREFIX: &str = "ADAPTIVE_TTL_";

/// Which TTL strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    RuleBased,
    Weighted,
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rule-based" | "rule_based" | "rules" => Ok(Self::RuleBased),
            "weighted" => Ok(Self::Weighted),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub strategy: StrategyKind,

    /// Strategy options; the weighted strategy only reads `ttl.base`.
    pub ttl: RuleBasedTtlOptions,

    pub cache: AdaptiveCacheOptions,

    /// Backend used by the demo binary.
    pub backend: CacheConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            ttl: RuleBasedTtlOptions::default(),
            cache: AdaptiveCacheOptions::default(),
            backend: CacheConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from `.env` and environment variables.
    ///
    /// Unset variables keep their defaults. Out-of-range values are
    /// rejected here rather than at first use.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvReader { lookup };
        let mut settings = Self::default();

        if let Some(kind) = vars.get::<StrategyKind>("STRATEGY")? {
            settings.strategy = kind;
        }

        let base = &mut settings.ttl.base;
        if let Some(secs) = vars.get::<u64>("MIN_TTL_SECS")? {
            base.min_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = vars.get::<u64>("MAX_TTL_SECS")? {
            base.max_ttl = Duration::from_secs(secs);
        }
        if let Some(rate) = vars.get::<f64>("TARGET_HIT_RATE")? {
            base.target_hit_rate = rate;
        }
        if let Some(ms) = vars.get::<u64>("TARGET_RESPONSE_TIME_MS")? {
            base.target_response_time = Duration::from_millis(ms);
        }
        if let Some(rate) = vars.get::<f64>("LEARNING_RATE")? {
            base.learning_rate = rate;
        }
        if let Some(factor) = vars.get::<f64>("DISCOUNT_FACTOR")? {
            base.discount_factor = factor;
        }
        if let Some(keys) = vars.get::<u64>("MAX_TRACKED_KEYS")? {
            base.max_tracked_keys = keys;
        }

        if let Some(secs) = vars.get::<u64>("DEFAULT_TTL_SECS")? {
            settings.cache.default_base_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = vars.get::<u64>("CLEANUP_INTERVAL_SECS")? {
            settings.cache.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = vars.get::<u64>("IDLE_TIMEOUT_SECS")? {
            settings.cache.metadata_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = vars.get::<u64>("CACHE_CAPACITY")? {
            settings.backend.max_capacity = capacity;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ttl.validate()?;
        self.cache.validate()
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        let var = format!("{ENV_PREFIX}{name}");
        let Some(raw) = (self.lookup)(&var).filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.strategy, StrategyKind::RuleBased);
        assert_eq!(settings.ttl, RuleBasedTtlOptions::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let settings = Settings::from_lookup(lookup(&[
            ("STRATEGY", "weighted"),
            ("MIN_TTL_SECS", "10"),
            ("MAX_TTL_SECS", "3600"),
            ("LEARNING_RATE", "0.25"),
            ("IDLE_TIMEOUT_SECS", "120"),
        ]))
        .unwrap();
        assert_eq!(settings.strategy, StrategyKind::Weighted);
        assert_eq!(settings.ttl.base.min_ttl, Duration::from_secs(10));
        assert_eq!(settings.ttl.base.max_ttl, Duration::from_secs(3600));
        assert_eq!(settings.ttl.base.learning_rate, 0.25);
        assert_eq!(settings.cache.metadata_idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!("Rule-Based".parse::<StrategyKind>(), Ok(StrategyKind::RuleBased));
        assert_eq!(" weighted ".parse::<StrategyKind>(), Ok(StrategyKind::Weighted));
        assert_eq!(
            "lru".parse::<StrategyKind>(),
            Err(ConfigError::UnknownStrategy("lru".to_string()))
        );
    }

    #[test]
    fn test_unknown_strategy_reported_with_variable() {
        let err = Settings::from_lookup(lookup(&[("STRATEGY", "lru")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "ADAPTIVE_TTL_STRATEGY".to_string(),
                value: "lru".to_string(),
            }
        );
    }

    #[test]
    fn test_unparsable_value_rejected() {
        let err = Settings::from_lookup(lookup(&[("MIN_TTL_SECS", "five")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "ADAPTIVE_TTL_MIN_TTL_SECS".to_string(),
                value: "five".to_string(),
            }
        );
    }

    #[test]
    fn test_out_of_range_rejected_at_load() {
        let err = Settings::from_lookup(lookup(&[("TARGET_HIT_RATE", "1.5")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "target_hit_rate", .. }));
    }
}
