//! The profiling pipeline
//!
//! [`Profiler`] ties the collaborators together behind the two user-facing
//! operations: [`Profiler::start`] turns a URL into a session and its first
//! question, [`Profiler::answer`] records an answer and returns either the
//! next question or the final classification.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use profiler_cache::{CacheFamily, TieredCache};

use crate::classification::ClassificationOrchestrator;
use crate::collaborators::{ContentAnalyzer, Classifier, QuestionGenerator, Scraper, StopOracle};
use crate::config::{ProfilerConfig, StoreKind, TimeoutConfig};
use crate::content::{ContentHash, ContentHasher, ScrapedContent};
use crate::error::{ProfilerError, Result};
use crate::llm::LanguageModel;
use crate::model::{Classification, ContentAnalysis, ContentRecord, Generated, Question, Session};
use crate::resilience::{with_timeout, RetryPolicy};
use crate::scraper::HttpScraper;
use crate::session::{RespondOutcome, SessionStateMachine};
use crate::store::{DurableStore, FileStore, GuardedStore, MemoryStore};

/// Collaborators the pipeline is assembled from
pub struct ProfilerDeps {
    pub scraper: Arc<dyn Scraper>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub oracle: Arc<dyn StopOracle>,
    pub classifier: Arc<dyn Classifier>,
    pub store: Arc<dyn DurableStore>,
    pub cache: Arc<TieredCache>,
}

/// A freshly started session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartOutcome {
    pub session_id: String,
    pub question: Question,
}

/// What the visitor sees after answering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnswerOutcome {
    Question(Question),
    Classification(Classification),
}

pub struct Profiler {
    scraper: Arc<dyn Scraper>,
    analyzer: Arc<dyn ContentAnalyzer>,
    store: Arc<dyn DurableStore>,
    cache: Arc<TieredCache>,
    hasher: ContentHasher,
    sessions: Arc<SessionStateMachine>,
    classifications: ClassificationOrchestrator,
    timeouts: TimeoutConfig,
    retry: RetryPolicy,
    content_ttl: Duration,
}

impl Profiler {
    /// Assemble a pipeline from explicit collaborators
    ///
    /// The durable store is wrapped so every call carries a deadline and
    /// reads are retried.
    pub fn new(deps: ProfilerDeps, config: &ProfilerConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn DurableStore> = Arc::new(GuardedStore::new(
            deps.store,
            config.timeouts.durable,
            config.retry,
        ));
        let sessions = Arc::new(SessionStateMachine::new(
            deps.cache.clone(),
            store.clone(),
            deps.generator,
            deps.oracle,
            config.session,
            config.timeouts,
        )?);
        let classifications = ClassificationOrchestrator::new(
            deps.cache.clone(),
            store.clone(),
            sessions.clone(),
            deps.classifier,
            config.quality.clone(),
            config.timeouts,
        );

        Ok(Self {
            scraper: deps.scraper,
            analyzer: deps.analyzer,
            store,
            cache: deps.cache,
            hasher: ContentHasher::new(config.normalization),
            sessions,
            classifications,
            timeouts: config.timeouts,
            retry: config.retry,
            content_ttl: config.storage.content_ttl(),
        })
    }

    /// Assemble the default pipeline: HTTP scraper, OpenAI-compatible model,
    /// the configured durable store and an in-memory hot cache
    pub fn from_config(config: &ProfilerConfig) -> Result<Self> {
        let scraper = Arc::new(HttpScraper::new(
            config.timeouts.scrape,
            config.scraper.max_page_bytes,
        )?);
        let model = Arc::new(LanguageModel::new(config.llm.clone())?);
        let store: Arc<dyn DurableStore> = match config.storage.kind {
            StoreKind::Memory => Arc::new(MemoryStore::new()),
            StoreKind::File => Arc::new(FileStore::new(&config.storage.data_dir)),
        };
        let cache = Arc::new(TieredCache::in_memory(config.cache.to_cache_config())?);

        info!(
            "Using {:?} store at {:?}, cache capacity {}",
            config.storage.kind, config.storage.data_dir, config.cache.capacity
        );

        Self::new(
            ProfilerDeps {
                scraper,
                analyzer: model.clone(),
                generator: model.clone(),
                oracle: model.clone(),
                classifier: model,
                store,
                cache,
            },
            config,
        )
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionStateMachine> {
        &self.sessions
    }

    /// Profile a page and open a session on it
    pub async fn start(&self, url: &str) -> Result<StartOutcome> {
        let url = validate_url(url)?;
        let (content_hash, analysis) = self.prepare_content(&url).await?;
        let (session_id, question) = self.sessions.create(&url, content_hash, analysis).await?;
        Ok(StartOutcome {
            session_id,
            question,
        })
    }

    /// Record an answer, classifying the session once questioning ends
    pub async fn answer(&self, session_id: &str, answer: &str) -> Result<AnswerOutcome> {
        match self.sessions.respond(session_id, answer).await? {
            RespondOutcome::NextQuestion(question) => Ok(AnswerOutcome::Question(question)),
            RespondOutcome::Terminal => {
                let classification = self.classifications.resolve(session_id).await?;
                Ok(AnswerOutcome::Classification(classification))
            }
        }
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.sessions.get(session_id).await
    }

    /// Classification of a terminal session
    pub async fn classification(&self, session_id: &str) -> Result<Classification> {
        self.classifications.resolve(session_id).await
    }

    /// Content hash and analysis for `url`, reusing earlier work when possible
    async fn prepare_content(&self, url: &str) -> Result<(ContentHash, ContentAnalysis)> {
        if let Some(reused) = self.revalidate(url).await {
            return Ok(reused);
        }

        let content = self.scrape(url).await?;
        let content_hash = self.hasher.hash(&content);
        debug!("Scraped {} as {}", url, content_hash);

        let analysis = self.analysis_for(&content, &content_hash).await;
        Ok((content_hash, analysis))
    }

    /// Reuse the stored record for `url` when the origin reports it unchanged
    async fn revalidate(&self, url: &str) -> Option<(ContentHash, ContentAnalysis)> {
        let record = match self.store.get_by_url(url).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                debug!("Origin lookup failed for {}: {}", url, e);
                return None;
            }
        };

        let unchanged = with_timeout(
            self.timeouts.scrape,
            "revalidate",
            self.scraper
                .is_unchanged(url, record.last_modified.as_deref(), record.etag.as_deref()),
        )
        .await;
        match unchanged {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!("Revalidation failed for {}, scraping: {}", url, e);
                return None;
            }
        }

        info!("{} unchanged since last scrape, reusing {}", url, record.content_hash);
        let analysis = match self.cached_analysis(&record.content_hash).await {
            Some(analysis) => analysis,
            None => {
                self.cache_analysis(&record.content_hash, &record.analysis).await;
                record.analysis
            }
        };
        Some((record.content_hash, analysis))
    }

    async fn scrape(&self, url: &str) -> Result<ScrapedContent> {
        self.retry
            .run("scrape", || {
                with_timeout(self.timeouts.scrape, "scrape", self.scraper.fetch(url))
            })
            .await
            .map_err(|e| match e {
                ProfilerError::Fetch { .. } => e,
                other => ProfilerError::Fetch {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    /// Hot cache, then durable store, then the analyzer
    async fn analysis_for(&self, content: &ScrapedContent, content_hash: &ContentHash) -> ContentAnalysis {
        if let Some(analysis) = self.cached_analysis(content_hash).await {
            debug!("Content cache hit for {}", content_hash);
            return analysis;
        }

        match self.store.get_by_hash(content_hash).await {
            Ok(Some(record)) => {
                debug!("Durable content hit for {}", content_hash);
                self.cache_analysis(content_hash, &record.analysis).await;
                let analysis = record.analysis.clone();
                // Same content re-fetched: refresh the origin validators and age
                let refreshed = ContentRecord {
                    created_at: Utc::now(),
                    last_modified: content.last_modified.clone(),
                    etag: content.etag.clone(),
                    ..record
                };
                if let Err(e) = self.store.put(&refreshed).await {
                    warn!("Failed to refresh content record {}: {}", content_hash, e);
                }
                return analysis;
            }
            Ok(None) => {}
            Err(e) => warn!("Durable content lookup failed for {}: {}", content_hash, e),
        }

        let generated = with_timeout(
            self.timeouts.analyze,
            "analyze",
            self.analyzer.analyze(&content.full_text()),
        )
        .await;
        let analysis = match generated {
            Ok(Generated::Valid(analysis)) if analysis.validate().is_ok() => analysis,
            Ok(Generated::Valid(_)) | Ok(Generated::Malformed { .. }) => {
                warn!("Unusable analysis for {}, using fallback", content.url);
                return ContentAnalysis::fallback();
            }
            Err(e) => {
                warn!("Analysis failed for {}, using fallback: {}", content.url, e);
                return ContentAnalysis::fallback();
            }
        };

        self.cache_analysis(content_hash, &analysis).await;
        let record = ContentRecord {
            url: content.url.clone(),
            content_hash: content_hash.clone(),
            title: content.title.clone(),
            raw_sections: content.section_texts(),
            analysis: analysis.clone(),
            created_at: Utc::now(),
            ttl_secs: self.content_ttl.as_secs(),
            last_modified: content.last_modified.clone(),
            etag: content.etag.clone(),
        };
        if let Err(e) = self.store.put(&record).await {
            warn!("Failed to persist content record {}: {}", content_hash, e);
        }
        analysis
    }

    async fn cached_analysis(&self, content_hash: &ContentHash) -> Option<ContentAnalysis> {
        match self
            .cache
            .get_json::<ContentAnalysis>(CacheFamily::Content, content_hash.as_str())
            .await
        {
            Ok(hit) => hit,
            Err(e) => {
                debug!("Content cache unavailable: {}", e);
                None
            }
        }
    }

    async fn cache_analysis(&self, content_hash: &ContentHash, analysis: &ContentAnalysis) {
        if let Err(e) = self
            .cache
            .set_json(CacheFamily::Content, content_hash.as_str(), analysis)
            .await
        {
            debug!("Could not cache analysis for {}: {}", content_hash, e);
        }
    }
}

/// Accept absolute http(s) URLs only
fn validate_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| ProfilerError::InvalidInput(format!("invalid url '{}': {}", trimmed, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        scheme => Err(ProfilerError::InvalidInput(format!(
            "unsupported url '{}' (scheme {})",
            trimmed, scheme
        ))),
    }
}
