//! Resolve a classification through cache, store, classifier and fallback

use std::sync::Arc;
use tracing::{debug, info, warn};

use profiler_cache::{CacheFamily, TieredCache};

use super::{heuristic_classification, QualityGate};
use crate::collaborators::Classifier;
use crate::config::TimeoutConfig;
use crate::error::{ProfilerError, Result};
use crate::model::{Classification, ClassificationSource, Generated, Session};
use crate::resilience::with_timeout;
use crate::session::SessionStateMachine;
use crate::store::DurableStore;

pub struct ClassificationOrchestrator {
    cache: Arc<TieredCache>,
    store: Arc<dyn DurableStore>,
    sessions: Arc<SessionStateMachine>,
    classifier: Arc<dyn Classifier>,
    gate: QualityGate,
    timeouts: TimeoutConfig,
}

impl ClassificationOrchestrator {
    pub fn new(
        cache: Arc<TieredCache>,
        store: Arc<dyn DurableStore>,
        sessions: Arc<SessionStateMachine>,
        classifier: Arc<dyn Classifier>,
        gate: QualityGate,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            cache,
            store,
            sessions,
            classifier,
            gate,
            timeouts,
        }
    }

    /// Classification for a terminal session
    ///
    /// Lookup order: hot cache, durable store, classifier plus quality gate,
    /// heuristic fallback. Once stored, every call returns the same value.
    pub async fn resolve(&self, session_id: &str) -> Result<Classification> {
        match self
            .cache
            .get_json::<Classification>(CacheFamily::Classification, session_id)
            .await
        {
            Ok(Some(classification)) => return Ok(classification),
            Ok(None) => {}
            Err(e) => debug!("Classification cache unavailable: {}", e),
        }

        match self.store.get_classification(session_id).await {
            Ok(Some(classification)) => {
                self.cache_classification(&classification).await;
                return Ok(classification);
            }
            Ok(None) => {}
            Err(e) => warn!("Classification lookup failed for {}: {}", session_id, e),
        }

        let session = self.sessions.get(session_id).await?;
        if !session.is_terminal() {
            return Err(ProfilerError::SessionNotTerminal(session_id.to_string()));
        }

        let classification = self.generate(&session).await;

        let classification = match self.store.put_classification(&classification).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to persist classification for {}: {}", session_id, e);
                classification
            }
        };
        self.cache_classification(&classification).await;

        info!(
            "Resolved {:?} classification for session {}",
            classification.source, session_id
        );
        Ok(classification)
    }

    async fn generate(&self, session: &Session) -> Classification {
        let generated = with_timeout(
            self.timeouts.classify,
            "classify",
            self.classifier
                .classify(&session.content_analysis, &session.responses),
        )
        .await;

        match generated {
            Ok(Generated::Valid(draft)) => match self.gate.check(&draft) {
                Ok(()) => {
                    return Classification::from_draft(
                        &session.session_id,
                        draft,
                        ClassificationSource::Generated,
                    )
                }
                Err(issue) => warn!(
                    "Classification for {} rejected: {}",
                    session.session_id,
                    ProfilerError::Validation(issue.to_string())
                ),
            },
            Ok(Generated::Malformed { raw }) => {
                warn!("Malformed classification for {}: {}", session.session_id, raw)
            }
            Err(e) => warn!("Classifier failed for {}: {}", session.session_id, e),
        }

        self.fallback(session).await
    }

    async fn fallback(&self, session: &Session) -> Classification {
        let mut candidates = match self.store.get_by_hash(&session.content_hash).await {
            Ok(Some(record)) => record.raw_sections,
            Ok(None) => Vec::new(),
            Err(e) => {
                debug!("Content record unavailable for fallback: {}", e);
                Vec::new()
            }
        };
        candidates.extend(session.content_analysis.sections.iter().cloned());

        heuristic_classification(
            &session.session_id,
            session.latest_answer(),
            &candidates,
            &self.gate,
        )
    }

    async fn cache_classification(&self, classification: &Classification) {
        if let Err(e) = self
            .cache
            .set_json(
                CacheFamily::Classification,
                &classification.session_id,
                classification,
            )
            .await
        {
            debug!("Could not cache classification: {}", e);
        }
    }
}
