//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - namespaced string keys
pub type CacheKey = String;

/// Cache value type - opaque serialized payload
pub type CacheValue = String;

/// Prefix shared by every key the profiler writes to the backend
pub const KEY_NAMESPACE: &str = "profiler";

/// Key family stored in the hot tier.
///
/// Each family carries its own default TTL (see `CacheConfig::ttl_for`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheFamily {
    /// Content analysis keyed by content hash
    Content,

    /// Generated opening question keyed by content hash
    FirstQuestion,

    /// Live session state keyed by session id
    Session,

    /// Resolved classification keyed by session id
    Classification,
}

impl CacheFamily {
    /// All families, in the order eviction scans them
    pub const ALL: [CacheFamily; 4] = [
        CacheFamily::Content,
        CacheFamily::FirstQuestion,
        CacheFamily::Session,
        CacheFamily::Classification,
    ];

    /// Short name used inside backend keys
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheFamily::Content => "content",
            CacheFamily::FirstQuestion => "first_question",
            CacheFamily::Session => "session",
            CacheFamily::Classification => "classification",
        }
    }

    /// Backend key holding the value
    pub fn value_key(&self, key: &str) -> CacheKey {
        format!("{}:{}:{}", KEY_NAMESPACE, self.as_str(), key)
    }

    /// Prefix matching every value key of this family
    pub fn value_prefix(&self) -> String {
        format!("{}:{}:", KEY_NAMESPACE, self.as_str())
    }

    /// Backend key holding the access-frequency counter for a value key
    pub fn frequency_key(value_key: &str) -> CacheKey {
        format!("{}:freq:{}", KEY_NAMESPACE, value_key)
    }

    /// Backend key holding the write sequence number for a value key
    pub fn sequence_key(value_key: &str) -> CacheKey {
        format!("{}:seq:{}", KEY_NAMESPACE, value_key)
    }

    /// Backend key of the global write sequence counter
    pub fn write_sequence_counter() -> CacheKey {
        format!("{}:meta:write_seq", KEY_NAMESPACE)
    }
}

impl fmt::Display for CacheFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics and metrics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Number of successful writes
    pub writes: u64,

    /// Number of entries evicted by the LFU policy
    pub evictions_lfu: u64,

    /// Number of explicit deletes
    pub deletes: u64,

    /// Number of operations that failed with the backend unavailable
    pub unavailable: u64,

    /// Number of payloads dropped because they failed to decode
    pub decode_failures: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Total number of reads served
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, writes: {}, evictions: {}, unavailable: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.writes,
            self.evictions_lfu,
            self.unavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert_eq!(stats.hit_rate(), 80.0);
        assert_eq!(stats.miss_rate(), 20.0);
        assert_eq!(stats.lookups(), 100);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 100.0);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            hits: 100,
            misses: 50,
            writes: 75,
            evictions_lfu: 10,
            ..Default::default()
        };

        let display = format!("{}", stats);
        assert!(display.contains("hits: 100"));
        assert!(display.contains("evictions: 10"));
    }

    #[test]
    fn test_family_key_layout() {
        let value_key = CacheFamily::Session.value_key("abc");
        assert_eq!(value_key, "profiler:session:abc");
        assert!(value_key.starts_with(&CacheFamily::Session.value_prefix()));

        let freq = CacheFamily::frequency_key(&value_key);
        assert_eq!(freq, "profiler:freq:profiler:session:abc");

        // Bookkeeping keys never fall under a family prefix
        for family in CacheFamily::ALL {
            assert!(!freq.starts_with(&family.value_prefix()));
            assert!(!CacheFamily::sequence_key(&value_key).starts_with(&family.value_prefix()));
        }
    }

    #[test]
    fn test_family_display() {
        assert_eq!(format!("{}", CacheFamily::Content), "content");
        assert_eq!(format!("{}", CacheFamily::FirstQuestion), "first_question");
        assert_eq!(format!("{}", CacheFamily::Classification), "classification");
    }
}
