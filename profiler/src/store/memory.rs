//! In-process durable store for tests and single-node development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::DurableStore;
use crate::content::ContentHash;
use crate::error::{ProfilerError, Result};
use crate::model::{Classification, ContentRecord, Session};

#[derive(Default)]
struct MemoryState {
    by_url: HashMap<String, ContentRecord>,
    by_hash: HashMap<ContentHash, ContentRecord>,
    sessions: HashMap<String, Session>,
    classifications: HashMap<String, Classification>,
}

/// [`DurableStore`] backed by hash maps behind one lock
///
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn record_count(&self) -> usize {
        self.state.read().await.by_hash.len()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get_by_url(&self, url: &str) -> Result<Option<ContentRecord>> {
        let state = self.state.read().await;
        Ok(state.by_url.get(url).filter(|r| !r.is_expired()).cloned())
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<ContentRecord>> {
        let state = self.state.read().await;
        Ok(state.by_hash.get(hash).filter(|r| !r.is_expired()).cloned())
    }

    async fn put(&self, record: &ContentRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(previous) = state.by_url.insert(record.url.clone(), record.clone()) {
            // Drop the old hash unless another origin still points at it
            let shared = state
                .by_url
                .values()
                .any(|r| r.content_hash == previous.content_hash);
            if previous.content_hash != record.content_hash && !shared {
                state.by_hash.remove(&previous.content_hash);
            }
        }
        state
            .by_hash
            .insert(record.content_hash.clone(), record.clone());
        debug!("Stored content record {} for {}", record.content_hash, record.url);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.state.read().await.sessions.get(session_id).cloned())
    }

    async fn put_session(&self, session: &Session, expected_version: u64) -> Result<()> {
        let mut state = self.state.write().await;
        let found = state
            .sessions
            .get(&session.session_id)
            .map(|s| s.version)
            .unwrap_or(0);
        if found != expected_version {
            return Err(ProfilerError::SessionConflict {
                session_id: session.session_id.clone(),
                expected: expected_version,
                found,
            });
        }
        state
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_classification(&self, session_id: &str) -> Result<Option<Classification>> {
        Ok(self
            .state
            .read()
            .await
            .classifications
            .get(session_id)
            .cloned())
    }

    async fn put_classification(
        &self,
        classification: &Classification,
    ) -> Result<Classification> {
        let mut state = self.state.write().await;
        let stored = state
            .classifications
            .entry(classification.session_id.clone())
            .or_insert_with(|| classification.clone());
        Ok(stored.clone())
    }
}
