//! Visitor session lifecycle
//!
//! A session moves `Init -> Questioning -> Terminal`. Each call loads the
//! session (hot cache, then durable store), mutates it locally and persists
//! it with a compare-and-swap on its version, so two concurrent answers to the
//! same session cannot both be applied: the second writer gets
//! [`ProfilerError::SessionConflict`].

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use profiler_cache::{CacheFamily, TieredCache};

use crate::collaborators::{QuestionGenerator, StopOracle};
use crate::config::{SessionConfig, TimeoutConfig};
use crate::content::ContentHash;
use crate::error::{ProfilerError, Result};
use crate::model::{ContentAnalysis, Generated, Question, Session};
use crate::resilience::with_timeout;
use crate::store::DurableStore;

/// Result of recording an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    /// Questioning continues with this question
    NextQuestion(Question),
    /// Enough answers collected; the session is ready for classification
    Terminal,
}

/// Owns question issuance, response recording and the stop decision
pub struct SessionStateMachine {
    cache: Arc<TieredCache>,
    store: Arc<dyn DurableStore>,
    generator: Arc<dyn QuestionGenerator>,
    oracle: Arc<dyn StopOracle>,
    config: SessionConfig,
    timeouts: TimeoutConfig,
}

impl SessionStateMachine {
    pub fn new(
        cache: Arc<TieredCache>,
        store: Arc<dyn DurableStore>,
        generator: Arc<dyn QuestionGenerator>,
        oracle: Arc<dyn StopOracle>,
        config: SessionConfig,
        timeouts: TimeoutConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache,
            store,
            generator,
            oracle,
            config,
            timeouts,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session and issue its first question
    ///
    /// Fails if the session cannot be persisted durably.
    pub async fn create(
        &self,
        url: &str,
        content_hash: ContentHash,
        content_analysis: ContentAnalysis,
    ) -> Result<(String, Question)> {
        let session_id = Uuid::new_v4().to_string();
        let question = self.first_question(&content_hash, &content_analysis).await;

        let mut session = Session::new(&session_id, url, content_hash, content_analysis);
        session.issue(question.clone());
        session.version = 1;

        self.store.put_session(&session, 0).await?;
        self.cache_session(&session).await;

        info!("Created session {} for {}", session_id, url);
        Ok((session_id, question))
    }

    /// Record an answer and decide whether to continue
    pub async fn respond(&self, session_id: &str, answer: &str) -> Result<RespondOutcome> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ProfilerError::InvalidInput(
                "answer must not be empty".to_string(),
            ));
        }

        let mut session = self.get(session_id).await?;
        if session.is_terminal() {
            debug!("Session {} already terminal, ignoring answer", session_id);
            return Ok(RespondOutcome::Terminal);
        }

        let expected_version = session.version;
        session.record_response(answer)?;

        let outcome = if self.should_stop(&session).await {
            session.terminate();
            RespondOutcome::Terminal
        } else {
            let question = self.next_question(&session).await;
            session.issue(question.clone());
            RespondOutcome::NextQuestion(question)
        };
        session.version = expected_version + 1;

        if let Err(e) = self.store.put_session(&session, expected_version).await {
            if matches!(e, ProfilerError::SessionConflict { .. }) {
                // The cached copy may be the stale one; force the next load to the store
                if let Err(cache_err) = self.cache.delete(CacheFamily::Session, session_id).await {
                    debug!("Could not drop cached session {}: {}", session_id, cache_err);
                }
            }
            warn!("Failed to persist session {}: {}", session_id, e);
            return Err(e);
        }
        self.cache_session(&session).await;

        info!(
            "Session {} recorded answer {} ({})",
            session_id,
            session.response_count(),
            match outcome {
                RespondOutcome::Terminal => "terminal",
                RespondOutcome::NextQuestion(_) => "questioning",
            }
        );
        Ok(outcome)
    }

    /// Load a session from the hot cache, falling back to the durable store
    pub async fn get(&self, session_id: &str) -> Result<Session> {
        match self
            .cache
            .get_json::<Session>(CacheFamily::Session, session_id)
            .await
        {
            Ok(Some(session)) => return Ok(session),
            Ok(None) => {}
            Err(e) => debug!("Session cache unavailable, reading store: {}", e),
        }

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ProfilerError::SessionNotFound(session_id.to_string()))?;
        self.cache_session(&session).await;
        Ok(session)
    }

    /// Whether questioning should end after the responses recorded so far
    async fn should_stop(&self, session: &Session) -> bool {
        let answered = session.response_count();
        if answered < self.config.min_questions {
            return false;
        }
        if answered >= self.config.max_questions {
            return true;
        }

        let decision = with_timeout(
            self.timeouts.oracle,
            "stop oracle",
            self.oracle
                .should_stop(&session.content_analysis, &session.responses),
        )
        .await;
        match decision {
            Ok(stop) => stop,
            Err(e) => {
                let stop = answered >= 2;
                warn!(
                    "Stop oracle failed for session {}, defaulting to {}: {}",
                    session.session_id, stop, e
                );
                stop
            }
        }
    }

    async fn first_question(&self, content_hash: &ContentHash, analysis: &ContentAnalysis) -> Question {
        match self
            .cache
            .get_json::<Question>(CacheFamily::FirstQuestion, content_hash.as_str())
            .await
        {
            Ok(Some(question)) if question.validate().is_ok() => {
                debug!("First question cache hit for {}", content_hash);
                return question;
            }
            Ok(_) => {}
            Err(e) => debug!("First question cache unavailable: {}", e),
        }

        let generated = with_timeout(
            self.timeouts.generate,
            "first question",
            self.generator.generate_first(analysis),
        )
        .await;
        match generated {
            Ok(Generated::Valid(question)) if question.validate().is_ok() => {
                if let Err(e) = self
                    .cache
                    .set_json(CacheFamily::FirstQuestion, content_hash.as_str(), &question)
                    .await
                {
                    debug!("Could not cache first question: {}", e);
                }
                question
            }
            Ok(Generated::Valid(question)) => {
                warn!("Generated first question failed validation, using fallback: {:?}", question);
                Question::fallback_first()
            }
            Ok(Generated::Malformed { raw }) => {
                warn!("Malformed first question, using fallback: {}", raw);
                Question::fallback_first()
            }
            Err(e) => {
                warn!("First question generation failed, using fallback: {}", e);
                Question::fallback_first()
            }
        }
    }

    async fn next_question(&self, session: &Session) -> Question {
        let generated = with_timeout(
            self.timeouts.generate,
            "next question",
            self.generator
                .generate_next(&session.content_analysis, &session.responses),
        )
        .await;
        match generated {
            Ok(Generated::Valid(question)) if question.validate().is_ok() => question,
            Ok(Generated::Valid(question)) => {
                warn!("Generated follow-up failed validation, using fallback: {:?}", question);
                Question::fallback_next()
            }
            Ok(Generated::Malformed { raw }) => {
                warn!("Malformed follow-up question, using fallback: {}", raw);
                Question::fallback_next()
            }
            Err(e) => {
                warn!("Follow-up generation failed, using fallback: {}", e);
                Question::fallback_next()
            }
        }
    }

    /// Refresh the cached copy, or drop it so reads go to the store
    async fn cache_session(&self, session: &Session) {
        let session_id = &session.session_id;
        if let Err(e) = self
            .cache
            .set_json(CacheFamily::Session, session_id, session)
            .await
        {
            debug!("Could not cache session {}: {}", session_id, e);
            if let Err(e) = self.cache.delete(CacheFamily::Session, session_id).await {
                warn!("Could not drop stale cached session {}: {}", session_id, e);
            }
        }
    }
}
