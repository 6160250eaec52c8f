//! Family-keyed hot tier with LFU admission control
//!
//! `TieredCache` is deliberately tier-agnostic: a miss here never falls
//! through to the durable store. Composition of tiers is the caller's job.

use crate::cache::{
    backend::{HotCacheBackend, MemoryBackend, TimedBackend},
    config::CacheConfig,
    eviction::EvictionPolicy,
    types::{CacheFamily, CacheStats, CacheValue},
};
use crate::error::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lifetime of the global write sequence counter
const WRITE_SEQUENCE_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Hot cache tier shared by all in-flight requests
pub struct TieredCache {
    config: CacheConfig,
    backend: Arc<dyn HotCacheBackend>,
    policy: EvictionPolicy,
    stats: RwLock<CacheStats>,
}

impl TieredCache {
    /// Create a cache over the given backend.
    ///
    /// Every backend call made through the cache carries
    /// `config.operation_timeout`.
    pub fn new(config: CacheConfig, backend: Arc<dyn HotCacheBackend>) -> Result<Self> {
        config.validate().map_err(CacheError::Config)?;
        info!(
            "Initializing tiered cache (capacity {}, op timeout {:?})",
            config.max_entries, config.operation_timeout
        );

        let backend: Arc<dyn HotCacheBackend> =
            Arc::new(TimedBackend::new(backend, config.operation_timeout));

        Ok(Self {
            policy: EvictionPolicy::new(config.max_entries),
            config,
            backend,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Create a cache over a fresh in-memory backend
    pub fn in_memory(config: CacheConfig) -> Result<Self> {
        Self::new(config, Arc::new(MemoryBackend::new()))
    }

    /// Cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read a value from the hot tier, recording an access on hit
    pub async fn get(&self, family: CacheFamily, key: &str) -> Result<Option<CacheValue>> {
        let value_key = family.value_key(key);

        let value = match self.backend.get(&value_key).await {
            Ok(v) => v,
            Err(e) => return Err(self.unavailable("get", &value_key, e).await),
        };

        match value {
            Some(value) => {
                let ttl = self.config.ttl_for(family);
                let frequency_key = CacheFamily::frequency_key(&value_key);
                match self.backend.incr(&frequency_key, ttl).await {
                    // A fresh counter means the value may have been evicted meanwhile
                    Ok(1) => self.drop_orphan_counter(&value_key, &frequency_key).await,
                    Ok(_) => {}
                    Err(e) => debug!("Failed to record access for {}: {}", value_key, e),
                }
                self.record(|s| s.hits += 1).await;
                debug!("Cache hit: {}", value_key);
                Ok(Some(value))
            }
            None => {
                self.record(|s| s.misses += 1).await;
                debug!("Cache miss: {}", value_key);
                Ok(None)
            }
        }
    }

    /// Admit a value, evicting least-frequently-used keys first if full
    pub async fn set(&self, family: CacheFamily, key: &str, value: CacheValue) -> Result<()> {
        let value_key = family.value_key(key);
        if let Err(e) = self.admit(family, &value_key, value).await {
            return Err(self.unavailable("set", &value_key, e).await);
        }
        self.record(|s| s.writes += 1).await;
        Ok(())
    }

    /// Remove a value and its bookkeeping in one backend operation.
    ///
    /// Returns true if the value was present.
    pub async fn delete(&self, family: CacheFamily, key: &str) -> Result<bool> {
        let value_key = family.value_key(key);
        let keys = vec![
            CacheFamily::frequency_key(&value_key),
            CacheFamily::sequence_key(&value_key),
            value_key.clone(),
        ];

        match self.backend.delete(&keys).await {
            Ok(removed) => {
                self.record(|s| s.deletes += 1).await;
                debug!("Deleted {} ({} keys)", value_key, removed);
                Ok(removed > 0)
            }
            Err(e) => Err(self.unavailable("delete", &value_key, e).await),
        }
    }

    /// Read and decode a JSON payload.
    ///
    /// A payload that fails to decode is dropped and reported as a miss.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        family: CacheFamily,
        key: &str,
    ) -> Result<Option<T>> {
        let Some(raw) = self.get(family, key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Dropping undecodable {} entry {}: {}", family, key, e);
                self.record(|s| s.decode_failures += 1).await;
                let _ = self.delete(family, key).await;
                Ok(None)
            }
        }
    }

    /// Encode a value as JSON and admit it
    pub async fn set_json<T: Serialize>(
        &self,
        family: CacheFamily,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(family, key, raw).await
    }

    /// Number of live value keys across all families
    pub async fn len(&self) -> Result<usize> {
        Ok(self.policy.live_keys(self.backend.as_ref()).await?.len())
    }

    /// Check if the hot tier holds no values
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    async fn admit(&self, family: CacheFamily, value_key: &str, value: CacheValue) -> Result<()> {
        // Overwriting a live key does not grow the key count
        let already_live = self.backend.get(value_key).await?.is_some();
        if !already_live {
            let evicted = self.policy.evict_if_full(self.backend.as_ref()).await?;
            if !evicted.is_empty() {
                let count = evicted.len() as u64;
                self.record(|s| s.evictions_lfu += count).await;
                debug!("Evicted {} entries to admit {}", count, value_key);
            }
        }

        let ttl = self.config.ttl_with_jitter(family);
        let sequence = self
            .backend
            .incr(&CacheFamily::write_sequence_counter(), WRITE_SEQUENCE_TTL)
            .await?;

        self.backend.set(value_key, value, ttl).await?;
        self.backend
            .set(&CacheFamily::sequence_key(value_key), sequence.to_string(), ttl)
            .await?;

        let frequency_key = CacheFamily::frequency_key(value_key);
        self.backend.incr(&frequency_key, ttl).await?;
        self.backend.expire(&frequency_key, ttl).await?;

        debug!("Cached {} (ttl {:?}, sequence {})", value_key, ttl, sequence);
        Ok(())
    }

    async fn drop_orphan_counter(&self, value_key: &str, frequency_key: &str) {
        match self.backend.get(value_key).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("Value {} gone, dropping its access counter", value_key);
                if let Err(e) = self.backend.delete(&[frequency_key.to_string()]).await {
                    debug!("Failed to drop counter {}: {}", frequency_key, e);
                }
            }
            Err(e) => debug!("Failed to recheck {}: {}", value_key, e),
        }
    }

    async fn unavailable(&self, operation: &str, key: &str, error: CacheError) -> CacheError {
        warn!("Cache {} failed for {}: {}", operation, key, error);
        self.record(|s| s.unavailable += 1).await;
        match error {
            CacheError::Unavailable(_) | CacheError::Config(_) => error,
            other => CacheError::Unavailable(other.to_string()),
        }
    }

    async fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if self.config.enable_metrics {
            let mut stats = self.stats.write().await;
            update(&mut stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn test_config(capacity: usize) -> CacheConfig {
        CacheConfig::builder()
            .max_entries(capacity)
            .uniform_ttl(Duration::from_secs(60))
            .ttl_jitter(0.0)
            .build()
    }

    #[tokio::test]
    async fn test_round_trip_every_family() {
        let cache = TieredCache::in_memory(test_config(100)).unwrap();

        for family in CacheFamily::ALL {
            cache
                .set(family, "k", format!("value-{}", family))
                .await
                .unwrap();
            assert_eq!(
                cache.get(family, "k").await.unwrap(),
                Some(format!("value-{}", family))
            );
        }

        // Same logical key in different families never collides
        assert_eq!(cache.len().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = TieredCache::in_memory(test_config(2)).unwrap();

        cache.set(CacheFamily::Content, "a", "1".into()).await.unwrap();
        cache.set(CacheFamily::Content, "b", "2".into()).await.unwrap();
        cache.set(CacheFamily::Content, "b", "3".into()).await.unwrap();

        // At capacity 2 a fresh key evicts down to 1 before admission
        assert_eq!(cache.len().await.unwrap(), 2);
        assert_eq!(
            cache.get(CacheFamily::Content, "b").await.unwrap(),
            Some("3".to_string())
        );
        assert_eq!(cache.stats().await.evictions_lfu, 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = TieredCache::in_memory(test_config(10)).unwrap();

        cache.set(CacheFamily::Session, "s1", "state".into()).await.unwrap();
        assert!(cache.delete(CacheFamily::Session, "s1").await.unwrap());
        assert!(!cache.delete(CacheFamily::Session, "s1").await.unwrap());
        assert!(cache.get(CacheFamily::Session, "s1").await.unwrap().is_none());
        assert!(cache.is_empty().await.unwrap());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let cache = TieredCache::in_memory(test_config(10)).unwrap();
        let payload = Payload {
            name: "pricing".into(),
            count: 3,
        };

        cache
            .set_json(CacheFamily::Classification, "s1", &payload)
            .await
            .unwrap();
        let loaded: Option<Payload> = cache
            .get_json(CacheFamily::Classification, "s1")
            .await
            .unwrap();
        assert_eq!(loaded, Some(payload));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_a_miss() {
        let cache = TieredCache::in_memory(test_config(10)).unwrap();
        cache
            .set(CacheFamily::Content, "h", "{not json".into())
            .await
            .unwrap();

        let loaded: Option<Payload> = cache.get_json(CacheFamily::Content, "h").await.unwrap();
        assert!(loaded.is_none());
        assert!(cache.get(CacheFamily::Content, "h").await.unwrap().is_none());
        assert_eq!(cache.stats().await.decode_failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = CacheConfig {
            max_entries: 0,
            ..Default::default()
        };
        assert!(matches!(
            TieredCache::in_memory(config),
            Err(CacheError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = TieredCache::in_memory(test_config(10)).unwrap();

        cache.set(CacheFamily::Content, "k", "v".into()).await.unwrap();
        cache.get(CacheFamily::Content, "k").await.unwrap();
        cache.get(CacheFamily::Content, "nope").await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    /// Backend that evicts a value right after serving it
    struct EvictAfterRead {
        inner: MemoryBackend,
    }

    #[async_trait::async_trait]
    impl HotCacheBackend for EvictAfterRead {
        async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
            let value = self.inner.get(key).await?;
            if value.is_some() {
                self.inner
                    .delete(&[
                        CacheFamily::frequency_key(key),
                        CacheFamily::sequence_key(key),
                        key.to_string(),
                    ])
                    .await?;
            }
            Ok(value)
        }
        async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
            self.inner.set(key, value, ttl).await
        }
        async fn delete(&self, keys: &[crate::cache::types::CacheKey]) -> Result<usize> {
            self.inner.delete(keys).await
        }
        async fn incr(&self, key: &str, ttl: Duration) -> Result<u64> {
            self.inner.incr(key, ttl).await
        }
        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
            self.inner.expire(key, ttl).await
        }
        async fn keys(&self, prefix: &str) -> Result<Vec<crate::cache::types::CacheKey>> {
            self.inner.keys(prefix).await
        }
    }

    #[tokio::test]
    async fn test_hit_on_evicted_value_leaves_no_counter() {
        let inner = MemoryBackend::new();
        let value_key = CacheFamily::Content.value_key("h");
        inner
            .set(&value_key, "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = TieredCache::new(
            test_config(10),
            Arc::new(EvictAfterRead {
                inner: inner.clone(),
            }),
        )
        .unwrap();

        assert_eq!(
            cache.get(CacheFamily::Content, "h").await.unwrap(),
            Some("v".to_string())
        );
        assert!(inner
            .get(&CacheFamily::frequency_key(&value_key))
            .await
            .unwrap()
            .is_none());
    }
}
