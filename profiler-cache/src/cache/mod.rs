//! # Hot Cache Tier
//!
//! This module implements the capacity-bounded, frequency-evicting layer that
//! sits in front of the durable store.
//!
//! ## Features
//!
//! - **Key families**: content analysis, first question, session state and
//!   classification, each with its own TTL
//! - **LFU admission control**: the key count never exceeds capacity after a
//!   write completes
//! - **Independent TTL**: a hot key still expires when its TTL elapses
//! - **Best-effort semantics**: backend failures and timeouts surface as
//!   [`CacheError::Unavailable`](crate::error::CacheError) so callers can
//!   treat them as misses
//!
//! ## Example
//!
//! ```rust
//! use profiler_cache::cache::{CacheConfig, CacheFamily, TieredCache};
//! use std::time::Duration;
//!
//! # async fn example() -> profiler_cache::Result<()> {
//! let config = CacheConfig::builder()
//!     .max_entries(1_000)
//!     .session_ttl(Duration::from_secs(3600))
//!     .build();
//!
//! let cache = TieredCache::in_memory(config)?;
//!
//! cache.set(CacheFamily::Session, "abc", "{}".to_string()).await?;
//!
//! if let Some(value) = cache.get(CacheFamily::Session, "abc").await? {
//!     println!("Cache hit: {}", value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod entry;
pub mod eviction;
pub mod tiered;
pub mod types;

pub use backend::{HotCacheBackend, MemoryBackend, TimedBackend};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use eviction::{EvictionCandidate, EvictionPolicy};
pub use tiered::TieredCache;
pub use types::{CacheFamily, CacheKey, CacheStats, CacheValue};
