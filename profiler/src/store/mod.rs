//! Durable tier
//!
//! The durable store holds content records (by origin URL and by content
//! hash), sessions and classifications. It has no capacity-driven eviction;
//! content records are reaped by their TTL when read.
//!
//! Session writes are compare-and-swap on [`Session::version`]: a write with
//! `expected_version` succeeds only if the stored session is at that version
//! (`0` meaning "does not exist yet"), otherwise it fails with
//! [`ProfilerError::SessionConflict`](crate::error::ProfilerError::SessionConflict).

use async_trait::async_trait;

use crate::content::ContentHash;
use crate::error::Result;
use crate::model::{Classification, ContentRecord, Session};

pub mod file;
pub mod guarded;
pub mod memory;

pub use file::FileStore;
pub use guarded::GuardedStore;
pub use memory::MemoryStore;

/// Persistent storage contract
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Latest unexpired record fetched from `url`
    async fn get_by_url(&self, url: &str) -> Result<Option<ContentRecord>>;

    /// Unexpired record whose content hashes to `hash`
    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<ContentRecord>>;

    /// Store a record under both its URL and its content hash
    async fn put(&self, record: &ContentRecord) -> Result<()>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Compare-and-swap write of a session
    async fn put_session(&self, session: &Session, expected_version: u64) -> Result<()>;

    async fn get_classification(&self, session_id: &str) -> Result<Option<Classification>>;

    /// Insert-if-absent; returns whichever classification is stored afterwards
    async fn put_classification(&self, classification: &Classification)
        -> Result<Classification>;
}

/// Reject identifiers that are unsafe to use as storage keys
pub(crate) fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
