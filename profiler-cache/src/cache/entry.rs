//! Backend cache entry with TTL support

use crate::cache::types::{CacheKey, CacheValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored key with its payload and expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: CacheKey,

    /// The cached value
    pub value: CacheValue,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create a new cache entry expiring after `ttl`
    pub fn new(key: CacheKey, value: CacheValue, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            key,
            value,
            created_at: now,
            expires_at: expiry_from(now, ttl),
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against a given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if self.is_expired_at(now) {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Reset expiration to `ttl` from now, keeping the value
    pub fn expire_in(&mut self, ttl: Duration) {
        self.expires_at = expiry_from(Utc::now(), ttl);
    }

    /// Approximate size of this entry in bytes
    pub fn calculate_size(&self) -> usize {
        self.key.len() + self.value.len() + std::mem::size_of::<DateTime<Utc>>() * 2
    }
}

fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_cache_entry_creation() {
        let entry = CacheEntry::new(
            "test_key".to_string(),
            "test_value".to_string(),
            Duration::from_secs(3600),
        );

        assert_eq!(entry.key, "test_key");
        assert_eq!(entry.value, "test_value");
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(
            "test".to_string(),
            "value".to_string(),
            Duration::from_millis(100),
        );

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(150));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_expire_in_extends_lifetime() {
        let mut entry = CacheEntry::new(
            "test".to_string(),
            "value".to_string(),
            Duration::from_millis(10),
        );

        entry.expire_in(Duration::from_secs(60));
        sleep(Duration::from_millis(20));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_time_until_expiration() {
        let entry = CacheEntry::new(
            "test".to_string(),
            "value".to_string(),
            Duration::from_secs(3600),
        );

        let time_left = entry.time_until_expiration();
        assert!(time_left.is_some());
        assert!(time_left.unwrap() <= Duration::from_secs(3600));
    }

    #[test]
    fn test_calculate_size() {
        let entry = CacheEntry::new("key".to_string(), "value".to_string(), Duration::from_secs(1));
        assert!(entry.calculate_size() >= "key".len() + "value".len());
    }
}
