//! Deadline and retry wrapper for any [`DurableStore`]

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::DurableStore;
use crate::content::ContentHash;
use crate::error::{ProfilerError, Result};
use crate::model::{Classification, ContentRecord, Session};
use crate::resilience::{with_timeout, RetryPolicy};

/// Bounds every call with a deadline and retries reads with backoff
///
/// An elapsed deadline is reported as [`ProfilerError::Persistence`], the
/// same kind as any other store failure. Writes are never retried.
pub struct GuardedStore {
    inner: Arc<dyn DurableStore>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GuardedStore {
    pub fn new(inner: Arc<dyn DurableStore>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            inner,
            timeout,
            retry,
        }
    }

    async fn bounded<T, Fut>(&self, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        with_timeout(self.timeout, operation, fut)
            .await
            .map_err(|e| match e {
                ProfilerError::Timeout { .. } => ProfilerError::Persistence(e.to_string()),
                other => other,
            })
    }
}

#[async_trait]
impl DurableStore for GuardedStore {
    async fn get_by_url(&self, url: &str) -> Result<Option<ContentRecord>> {
        self.retry
            .run("durable get_by_url", || {
                self.bounded("durable get_by_url", self.inner.get_by_url(url))
            })
            .await
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<ContentRecord>> {
        self.retry
            .run("durable get_by_hash", || {
                self.bounded("durable get_by_hash", self.inner.get_by_hash(hash))
            })
            .await
    }

    async fn put(&self, record: &ContentRecord) -> Result<()> {
        self.bounded("durable put", self.inner.put(record)).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.retry
            .run("durable get_session", || {
                self.bounded("durable get_session", self.inner.get_session(session_id))
            })
            .await
    }

    async fn put_session(&self, session: &Session, expected_version: u64) -> Result<()> {
        self.bounded(
            "durable put_session",
            self.inner.put_session(session, expected_version),
        )
        .await
    }

    async fn get_classification(&self, session_id: &str) -> Result<Option<Classification>> {
        self.retry
            .run("durable get_classification", || {
                self.bounded(
                    "durable get_classification",
                    self.inner.get_classification(session_id),
                )
            })
            .await
    }

    async fn put_classification(
        &self,
        classification: &Classification,
    ) -> Result<Classification> {
        self.bounded(
            "durable put_classification",
            self.inner.put_classification(classification),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store whose session reads fail a fixed number of times, then hang
    struct FlakyStore {
        inner: MemoryStore,
        failures_left: AtomicU32,
        hang_writes: bool,
    }

    #[async_trait]
    impl DurableStore for FlakyStore {
        async fn get_by_url(&self, url: &str) -> Result<Option<ContentRecord>> {
            self.inner.get_by_url(url).await
        }
        async fn get_by_hash(&self, hash: &ContentHash) -> Result<Option<ContentRecord>> {
            self.inner.get_by_hash(hash).await
        }
        async fn put(&self, record: &ContentRecord) -> Result<()> {
            self.inner.put(record).await
        }
        async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(ProfilerError::Persistence("connection reset".into()));
            }
            self.inner.get_session(session_id).await
        }
        async fn put_session(&self, session: &Session, expected_version: u64) -> Result<()> {
            if self.hang_writes {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.inner.put_session(session, expected_version).await
        }
        async fn get_classification(&self, session_id: &str) -> Result<Option<Classification>> {
            self.inner.get_classification(session_id).await
        }
        async fn put_classification(
            &self,
            classification: &Classification,
        ) -> Result<Classification> {
            self.inner.put_classification(classification).await
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_reads_are_retried() {
        let flaky = FlakyStore {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(2),
            hang_writes: false,
        };
        let store = GuardedStore::new(Arc::new(flaky), Duration::from_secs(1), fast_retry());

        assert_eq!(store.get_session("missing").await, Ok(None));
    }

    #[tokio::test]
    async fn test_reads_fail_after_retry_budget() {
        let flaky = FlakyStore {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(5),
            hang_writes: false,
        };
        let store = GuardedStore::new(Arc::new(flaky), Duration::from_secs(1), fast_retry());

        assert!(matches!(
            store.get_session("missing").await,
            Err(ProfilerError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_hung_write_times_out_as_persistence_error() {
        let flaky = FlakyStore {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(0),
            hang_writes: true,
        };
        let store = GuardedStore::new(Arc::new(flaky), Duration::from_millis(20), fast_retry());
        let hash = ContentHash::parse(&"d".repeat(64)).unwrap();
        let session = Session::new("s", "https://a.test", hash, crate::model::ContentAnalysis::fallback());

        let result = store.put_session(&session, 0).await;
        assert!(matches!(result, Err(ProfilerError::Persistence(msg)) if msg.contains("timed out")));
    }
}
