//! Per-key access tracking for the adaptive decorator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;

/// Tracked state of one key.
#[derive(Debug, Clone)]
struct KeyMetadata {
    first_seen: Instant,
    last_access: Instant,
    accesses: u64,
    hits: u64,
    misses: u64,
    /// When the value was last written through the decorator.
    last_set: Option<Instant>,
    applied_ttl: Option<Duration>,
    /// Pending miss, cleared by the next write to measure recomputation time.
    last_miss: Option<Instant>,
    miss_cost: Duration,
    last_update: Option<DateTime<Utc>>,
}

impl KeyMetadata {
    fn new(now: Instant) -> Self {
        Self {
            first_seen: now,
            last_access: now,
            accesses: 0,
            hits: 0,
            misses: 0,
            last_set: None,
            applied_ttl: None,
            last_miss: None,
            miss_cost: Duration::ZERO,
            last_update: None,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.accesses += 1;
        self.last_access = now;
    }
}

/// Signals used to build the next TTL decision for a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct KeySignals {
    pub hit_rate: f64,
    /// Accesses per minute since the key was first seen.
    pub access_frequency: f64,
    pub miss_cost: Duration,
    pub last_update: Option<DateTime<Utc>>,
    pub accesses: u64,
}

/// What the decorator knew about a value when it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadObservation {
    pub current_ttl: Duration,
    pub was_stale: bool,
}

/// Concurrent keyed store; updates to different keys never contend on a
/// shared lock.
#[derive(Debug, Default)]
pub(crate) struct MetadataStore {
    entries: DashMap<String, KeyMetadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_capacity(1_000),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn signals(&self, key: &str, now: Instant) -> KeySignals {
        let Some(meta) = self.entries.get(key) else {
            return KeySignals::default();
        };

        let reads = meta.hits + meta.misses;
        let hit_rate = if reads > 0 {
            meta.hits as f64 / reads as f64
        } else {
            0.0
        };
        let elapsed = now
            .saturating_duration_since(meta.first_seen)
            .max(Duration::from_secs(1));

        KeySignals {
            hit_rate,
            access_frequency: meta.accesses as f64 * 60.0 / elapsed.as_secs_f64(),
            miss_cost: meta.miss_cost,
            last_update: meta.last_update,
            accesses: meta.accesses,
        }
    }

    /// Record a read. The whole update happens under the key's entry lock.
    pub fn record_get(&self, key: &str, hit: bool, now: Instant) -> ReadObservation {
        let mut meta = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| KeyMetadata::new(now));
        meta.touch(now);

        if hit {
            meta.hits += 1;
        } else {
            meta.misses += 1;
            meta.last_miss.get_or_insert(now);
        }

        let was_stale = hit
            && matches!(
                (meta.last_set, meta.applied_ttl),
                (Some(set_at), Some(ttl)) if now.saturating_duration_since(set_at) > ttl
            );

        ReadObservation {
            current_ttl: meta.applied_ttl.unwrap_or(Duration::ZERO),
            was_stale,
        }
    }

    pub fn record_set(&self, key: &str, applied_ttl: Duration, now: Instant, wall_clock: DateTime<Utc>) {
        let mut meta = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| KeyMetadata::new(now));
        meta.touch(now);

        if let Some(missed_at) = meta.last_miss.take() {
            meta.miss_cost = now.saturating_duration_since(missed_at);
        }
        meta.last_set = Some(now);
        meta.applied_ttl = Some(applied_ttl);
        meta.last_update = Some(wall_clock);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop keys idle for longer than `idle_timeout`.
    ///
    /// Candidate keys are copied out first and removed one by one afterwards,
    /// so no iterator is alive while entries are removed. Each removal
    /// re-checks idleness in case the key was touched in between.
    pub fn evict_idle(&self, idle_timeout: Duration, now: Instant) -> usize {
        let is_idle = |meta: &KeyMetadata| now.saturating_duration_since(meta.last_access) > idle_timeout;

        let candidates: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| is_idle(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .into_iter()
            .filter(|key| self.entries.remove_if(key, |_, meta| is_idle(meta)).is_some())
            .count()
    }
}
