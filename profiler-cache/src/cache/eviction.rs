//! Least-frequently-used eviction for the hot tier
//!
//! The policy runs synchronously on the admission path. When the backend's
//! stored key count shows the tier may be full, it counts the live value keys
//! of every family, and when that count has reached capacity it
//! removes the lowest-ranked keys until one slot is free for the pending
//! write. Ranking is by access frequency, ties broken by write order
//! (oldest first).

use crate::cache::{
    backend::HotCacheBackend,
    types::{CacheFamily, CacheKey},
};
use crate::error::Result;
use tracing::debug;

/// Ranking data for one live value key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    /// Backend value key
    pub key: CacheKey,

    /// Access frequency counter (0 if the counter is missing)
    pub frequency: u64,

    /// Write sequence number (0 if missing, i.e. treated as oldest)
    pub sequence: u64,
}

/// LFU policy bounded by a key count
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    capacity: usize,
}

impl EvictionPolicy {
    /// Create a policy for the given capacity
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Maximum number of live value keys
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of keys that must go so that `live` keys leave room for one write
    pub fn overflow(&self, live: usize) -> usize {
        if live < self.capacity {
            0
        } else {
            live + 1 - self.capacity
        }
    }

    /// Order candidates lowest rank first and keep the ones to evict
    pub fn select_victims(
        &self,
        mut candidates: Vec<EvictionCandidate>,
    ) -> Vec<EvictionCandidate> {
        let overflow = self.overflow(candidates.len());
        if overflow == 0 {
            return Vec::new();
        }

        candidates.sort_by(|a, b| {
            a.frequency
                .cmp(&b.frequency)
                .then(a.sequence.cmp(&b.sequence))
                .then_with(|| a.key.cmp(&b.key))
        });
        candidates.truncate(overflow);
        candidates
    }

    /// List every live value key across all families
    pub async fn live_keys(&self, backend: &dyn HotCacheBackend) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for family in CacheFamily::ALL {
            keys.extend(backend.keys(&family.value_prefix()).await?);
        }
        Ok(keys)
    }

    /// Evict lowest-ranked keys if the hot tier is at capacity.
    ///
    /// Returns the evicted value keys. Each victim's value, frequency counter
    /// and write sequence are removed in a single backend delete.
    pub async fn evict_if_full(&self, backend: &dyn HotCacheBackend) -> Result<Vec<CacheKey>> {
        // Stored keys bound the live value keys from above
        if let Some(stored) = backend.key_count().await? {
            if self.overflow(stored) == 0 {
                return Ok(Vec::new());
            }
        }

        let keys = self.live_keys(backend).await?;
        if self.overflow(keys.len()) == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::with_capacity(keys.len());
        for key in keys {
            let frequency = read_counter(backend, &CacheFamily::frequency_key(&key)).await?;
            let sequence = read_counter(backend, &CacheFamily::sequence_key(&key)).await?;
            candidates.push(EvictionCandidate {
                key,
                frequency,
                sequence,
            });
        }

        let victims = self.select_victims(candidates);
        let mut evicted = Vec::with_capacity(victims.len());
        for victim in victims {
            debug!(
                "Evicting {} (frequency {}, sequence {})",
                victim.key, victim.frequency, victim.sequence
            );
            backend
                .delete(&[
                    CacheFamily::frequency_key(&victim.key),
                    CacheFamily::sequence_key(&victim.key),
                    victim.key.clone(),
                ])
                .await?;
            evicted.push(victim.key);
        }

        Ok(evicted)
    }
}

async fn read_counter(backend: &dyn HotCacheBackend, key: &str) -> Result<u64> {
    Ok(backend
        .get(key)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}
