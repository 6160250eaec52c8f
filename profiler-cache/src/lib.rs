//! # Profiler Cache (profiler-cache)
//!
//! The hot tier of the visitor profiler's cache hierarchy.
//!
//! ## Features
//!
//! - Family-namespaced keys with per-family TTLs
//! - Least-frequently-used eviction enforced before every admission
//! - Pluggable backend contract (`get`/`set`/`delete`/`incr`/`expire`/`keys`)
//! - Per-operation deadlines on every backend round trip
//! - Hit/miss/eviction statistics
//!
//! ## Usage
//!
//! ```no_run
//! use profiler_cache::{CacheConfig, CacheFamily, TieredCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = TieredCache::in_memory(CacheConfig::default())?;
//!
//!     cache.set(CacheFamily::Content, "9f2c", "{\"topics\":[]}".to_string()).await?;
//!     let hit = cache.get(CacheFamily::Content, "9f2c").await?;
//!     println!("hit: {:?}", hit);
//!     println!("{}", cache.stats().await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheFamily, CacheKey, CacheStats, CacheValue,
    EvictionCandidate, EvictionPolicy, HotCacheBackend, MemoryBackend, TieredCache, TimedBackend,
};
pub use error::{CacheError, Result};
