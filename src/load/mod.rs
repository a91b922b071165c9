//! System load sources.
//!
//! Load is a normalised `[0, 1]` signal; the decorator queries it once per
//! write to shrink TTLs under pressure and grow them when idle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::warn;

/// Supplies the current system load.
#[async_trait]
pub trait SystemLoadMonitor: Send + Sync {
    /// Current load in `[0, 1]`.
    async fn current_load(&self) -> f64;
}

/// Clamp a reported load into `[0, 1]`, treating NaN as idle.
pub fn normalize_load(load: f64) -> f64 {
    if load.is_nan() { 0.0 } else { load.clamp(0.0, 1.0) }
}

/// Load value set by the host application.
#[derive(Debug)]
pub struct FixedLoadMonitor {
    bits: AtomicU64,
}

impl FixedLoadMonitor {
    pub fn new(load: f64) -> Self {
        Self {
            bits: AtomicU64::new(normalize_load(load).to_bits()),
        }
    }

    pub fn set_load(&self, load: f64) {
        self.bits.store(normalize_load(load).to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for FixedLoadMonitor {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[async_trait]
impl SystemLoadMonitor for FixedLoadMonitor {
    async fn current_load(&self) -> f64 {
        self.load()
    }
}

/// One-minute load average divided by the number of available cores.
#[derive(Debug, Clone)]
pub struct LoadAverageMonitor {
    path: PathBuf,
    cores: f64,
}

impl LoadAverageMonitor {
    pub fn new() -> Self {
        Self::with_path("/proc/loadavg")
    }

    /// Read from an alternative `loadavg`-formatted file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            path: path.into(),
            cores: cores as f64,
        }
    }

    fn parse(&self, contents: &str) -> Option<f64> {
        let one_minute = contents.split_whitespace().next()?.parse::<f64>().ok()?;
        Some(normalize_load(one_minute / self.cores))
    }
}

impl Default for LoadAverageMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemLoadMonitor for LoadAverageMonitor {
    async fn current_load(&self) -> f64 {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => self.parse(&contents).unwrap_or_else(|| {
                warn!("Unparsable load average in {}", self.path.display());
                0.0
            }),
            Err(e) => {
                warn!("Failed to read load average from {}: {}", self.path.display(), e);
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_load() {
        assert_eq!(normalize_load(f64::NAN), 0.0);
        assert_eq!(normalize_load(-1.0), 0.0);
        assert_eq!(normalize_load(3.5), 1.0);
        assert_eq!(normalize_load(0.42), 0.42);
    }

    #[tokio::test]
    async fn test_fixed_monitor_is_settable() {
        let monitor = FixedLoadMonitor::new(0.2);
        assert_eq!(monitor.current_load().await, 0.2);
        monitor.set_load(7.0);
        assert_eq!(monitor.current_load().await, 1.0);
    }

    #[test]
    fn test_parse_loadavg_line() {
        let monitor = LoadAverageMonitor {
            path: PathBuf::from("unused"),
            cores: 4.0,
        };
        assert_eq!(monitor.parse("2.00 1.50 1.00 3/512 12345\n"), Some(0.5));
        assert_eq!(monitor.parse("garbage"), None);
        assert_eq!(monitor.parse(""), None);
    }

    #[tokio::test]
    async fn test_missing_source_reports_idle() {
        let monitor = LoadAverageMonitor::with_path("/definitely/not/here/loadavg");
        assert_eq!(monitor.current_load().await, 0.0);
    }
}
