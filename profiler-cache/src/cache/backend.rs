//! Hot-tier key-value backends
//!
//! The tiered cache only needs a small contract from its store: per-key TTL,
//! an atomic multi-key delete, an atomic counter increment and a prefix scan
//! of live keys. Each call is atomic with respect to the store itself; the
//! cache never wraps backend calls in its own lock.

use crate::cache::{
    entry::CacheEntry,
    types::{CacheKey, CacheValue},
};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key-value store backing the hot tier
#[async_trait]
pub trait HotCacheBackend: Send + Sync {
    /// Read a live value
    async fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Write a value with a TTL, replacing any previous value and expiry
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()>;

    /// Remove all given keys in one atomic step, returning how many existed
    async fn delete(&self, keys: &[CacheKey]) -> Result<usize>;

    /// Atomically increment an integer counter.
    ///
    /// A missing or expired counter is created at 1 with `ttl_if_new`; an
    /// existing counter keeps its expiry.
    async fn incr(&self, key: &str, ttl_if_new: Duration) -> Result<u64>;

    /// Reset the expiry of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// List live keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> Result<Vec<CacheKey>>;

    /// Cheap upper bound on the number of stored keys of any kind.
    ///
    /// May count expired and bookkeeping keys. `None` means the backend cannot
    /// answer without a scan.
    async fn key_count(&self) -> Result<Option<usize>> {
        Ok(None)
    }
}

/// In-process backend with lazy TTL expiry
///
/// Expired entries are dropped when touched and on every prefix scan, so no
/// background sweeper is needed.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    store: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        info!("Initializing in-memory hot cache backend");
        Self::default()
    }

    /// Number of stored keys, including bookkeeping keys
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.values().filter(|e| !e.is_expired()).count()
    }

    /// Check if the backend holds no live keys
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Approximate size of all live entries in bytes
    pub async fn size_bytes(&self) -> usize {
        let store = self.store.read().await;
        store
            .values()
            .filter(|e| !e.is_expired())
            .map(CacheEntry::calculate_size)
            .sum()
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired_at(now));
        let purged = before - store.len();
        if purged > 0 {
            debug!("Purged {} expired entries", purged);
        }
        purged
    }

    /// Remove everything
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.len();
        store.clear();
        info!("Cleared {} entries from hot cache backend", count);
    }
}

#[async_trait]
impl HotCacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        {
            let store = self.store.read().await;
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Entry exists but expired: drop it under the write lock
        let mut store = self.store.write().await;
        if store.get(key).map(CacheEntry::is_expired).unwrap_or(false) {
            debug!("Cache entry expired: {}", key);
            store.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(key.to_string(), value, ttl);
        let mut store = self.store.write().await;
        store.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<usize> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let removed = keys
            .iter()
            .filter_map(|k| store.remove(k))
            .filter(|e| !e.is_expired_at(now))
            .count();
        Ok(removed)
    }

    async fn incr(&self, key: &str, ttl_if_new: Duration) -> Result<u64> {
        let mut store = self.store.write().await;

        if let Some(entry) = store.get_mut(key) {
            if !entry.is_expired() {
                let current: u64 = entry.value.parse().map_err(|_| {
                    CacheError::Unavailable(format!("value at {} is not an integer", key))
                })?;
                let next = current.saturating_add(1);
                entry.value = next.to_string();
                return Ok(next);
            }
        }

        store.insert(
            key.to_string(),
            CacheEntry::new(key.to_string(), "1".to_string(), ttl_if_new),
        );
        Ok(1)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut store = self.store.write().await;
        match store.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.expire_in(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<CacheKey>> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        store.retain(|_, entry| !entry.is_expired_at(now));
        Ok(store
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn key_count(&self) -> Result<Option<usize>> {
        Ok(Some(self.store.read().await.len()))
    }
}

/// Wraps a backend so every round trip carries a deadline.
///
/// An elapsed deadline is reported as [`CacheError::Timeout`], which callers
/// treat exactly like an unavailable backend.
pub struct TimedBackend {
    inner: Arc<dyn HotCacheBackend>,
    timeout: Duration,
}

impl TimedBackend {
    pub fn new(inner: Arc<dyn HotCacheBackend>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn run<T, F>(&self, operation: &str, key: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                operation: format!("{} {}", operation, key),
            }),
        }
    }
}

#[async_trait]
impl HotCacheBackend for TimedBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.run("get", key, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        self.run("set", key, self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<usize> {
        let label = keys.first().map(String::as_str).unwrap_or("");
        self.run("delete", label, self.inner.delete(keys)).await
    }

    async fn incr(&self, key: &str, ttl_if_new: Duration) -> Result<u64> {
        self.run("incr", key, self.inner.incr(key, ttl_if_new)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.run("expire", key, self.inner.expire(key, ttl)).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<CacheKey>> {
        self.run("keys", prefix, self.inner.keys(prefix)).await
    }

    async fn key_count(&self) -> Result<Option<usize>> {
        self.run("key_count", "", self.inner.key_count()).await
    }
}
