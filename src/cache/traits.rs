//! Contract of a distributed byte cache.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CacheError;

/// Expiration settings for one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Fixed wall-clock deadline.
    pub absolute_expiration: Option<DateTime<Utc>>,

    /// Deadline relative to the time of the write.
    pub absolute_expiration_relative_to_now: Option<Duration>,

    /// Entry expires when not read for this long.
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Expire `ttl` after the write.
    pub fn expires_in(ttl: Duration) -> Self {
        Self {
            absolute_expiration_relative_to_now: Some(ttl),
            ..Default::default()
        }
    }

    pub fn expires_at(deadline: DateTime<Utc>) -> Self {
        Self {
            absolute_expiration: Some(deadline),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn sliding(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// TTL requested by these options, if any.
    ///
    /// A deadline in the past yields zero. With both forms set the earlier
    /// one wins.
    pub fn requested_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        let from_deadline = self
            .absolute_expiration
            .map(|deadline| (deadline - now).to_std().unwrap_or(Duration::ZERO));

        match (self.absolute_expiration_relative_to_now, from_deadline) {
            (Some(relative), Some(absolute)) => Some(relative.min(absolute)),
            (relative, absolute) => relative.or(absolute),
        }
    }

    /// Options carrying `ttl` as the only deadline.
    ///
    /// The sliding window is kept but never allowed to outlive `ttl`.
    pub fn with_ttl(&self, ttl: Duration) -> Self {
        Self {
            absolute_expiration: None,
            absolute_expiration_relative_to_now: Some(ttl),
            sliding_expiration: self.sliding_expiration.map(|window| window.min(ttl)),
        }
    }
}

/// Byte cache with per-entry expiration.
///
/// Dropping a returned future cancels the operation.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Fetch a value, `None` on miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<(), CacheError>;

    /// Reset the sliding expiration of an entry.
    async fn refresh(&self, key: &str) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_requested_ttl_forms() {
        let now = Utc::now();
        assert_eq!(EntryOptions::default().requested_ttl(now), None);
        assert_eq!(
            EntryOptions::expires_in(Duration::from_secs(120)).requested_ttl(now),
            Some(Duration::from_secs(120))
        );
        let deadline = now + TimeDelta::seconds(60);
        assert_eq!(
            EntryOptions::expires_at(deadline).requested_ttl(now),
            Some(Duration::from_secs(60))
        );
        let past = now - TimeDelta::seconds(5);
        assert_eq!(EntryOptions::expires_at(past).requested_ttl(now), Some(Duration::ZERO));
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Utc::now();
        let options = EntryOptions {
            absolute_expiration: Some(now + TimeDelta::seconds(30)),
            absolute_expiration_relative_to_now: Some(Duration::from_secs(90)),
            sliding_expiration: None,
        };
        assert_eq!(options.requested_ttl(now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_with_ttl_caps_sliding() {
        let options = EntryOptions::expires_in(Duration::from_secs(600)).sliding(Duration::from_secs(300));
        let adjusted = options.with_ttl(Duration::from_secs(120));
        assert_eq!(adjusted.absolute_expiration_relative_to_now, Some(Duration::from_secs(120)));
        assert_eq!(adjusted.sliding_expiration, Some(Duration::from_secs(120)));
        assert_eq!(adjusted.absolute_expiration, None);
    }
}
