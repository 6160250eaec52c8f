//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

use profiler::{
    Classifier, ClassificationDraft, ContentAnalysis, ContentAnalyzer, DurableStore, Generated,
    MemoryStore, Profiler, ProfilerConfig, ProfilerDeps, ProfilerError, Question,
    QuestionGenerator, Response, Result, ScrapedContent, Scraper, Section, StopOracle,
};
use profiler_cache::{
    CacheConfig, CacheError, CacheKey, CacheValue, HotCacheBackend, MemoryBackend, TieredCache,
};

pub const URL: &str = "https://example.com/";

pub fn page() -> ScrapedContent {
    ScrapedContent::new(
        URL,
        "Acme Analytics",
        vec![
            Section::new("Acme Analytics turns product events into dashboards your whole team can read."),
            Section::new("Pricing starts free for small teams and scales per tracked user with volume discounts."),
            Section::new("Our support engineers answer chat and email around the clock, every day of the year."),
        ],
    )
}

pub fn analysis() -> ContentAnalysis {
    ContentAnalysis {
        topics: vec!["Product analytics".to_string(), "Pricing".to_string()],
        audience: vec!["Product managers".to_string()],
        sections: vec!["Dashboards".to_string(), "Pricing".to_string(), "Support".to_string()],
    }
}

pub fn question(text: &str) -> Question {
    Question::new(
        text,
        vec!["Pricing".to_string(), "Dashboards".to_string(), "Support".to_string()],
    )
}

pub fn good_draft() -> ClassificationDraft {
    ClassificationDraft {
        interests: vec!["Pricing for growing product teams".to_string()],
        relevant_sections: vec![
            "Pricing starts free for small teams and scales per tracked user with volume discounts.".to_string(),
            "Acme Analytics turns product events into dashboards your whole team can read.".to_string(),
        ],
    }
}

pub fn test_config() -> ProfilerConfig {
    let mut config = ProfilerConfig::default();
    config.retry = profiler::RetryPolicy::none();
    config.cache.ttl_jitter = 0.0;
    config
}

/// Scraper serving a fixed page, or failing every fetch
pub struct StaticScraper {
    pub content: Mutex<ScrapedContent>,
    pub fail: bool,
    pub unchanged: bool,
    pub fetches: AtomicUsize,
}

impl StaticScraper {
    pub fn serving(content: ScrapedContent) -> Self {
        Self {
            content: Mutex::new(content),
            fail: false,
            unchanged: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::serving(page())
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for StaticScraper {
    async fn fetch(&self, url: &str) -> Result<ScrapedContent> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProfilerError::Fetch {
                url: url.to_string(),
                reason: "HTTP 503 Service Unavailable".to_string(),
            });
        }
        Ok(self.content.lock().unwrap().clone())
    }

    async fn is_unchanged(
        &self,
        _url: &str,
        _last_modified: Option<&str>,
        _etag: Option<&str>,
    ) -> Result<bool> {
        Ok(self.unchanged)
    }
}

pub struct ScriptedAnalyzer {
    pub result: Option<ContentAnalysis>,
    pub calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn valid() -> Self {
        Self {
            result: Some(analysis()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn malformed() -> Self {
        Self {
            result: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<Generated<ContentAnalysis>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.result {
            Some(analysis) => Generated::Valid(analysis.clone()),
            None => Generated::malformed("not json"),
        })
    }
}

/// Generator producing numbered questions, or malformed output when told to
pub struct ScriptedGenerator {
    pub malformed: bool,
    /// Follow-up generation waits here when set
    pub barrier: Option<Arc<Barrier>>,
    pub first_calls: AtomicUsize,
    pub next_calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            malformed: false,
            barrier: None,
            first_calls: AtomicUsize::new(0),
            next_calls: AtomicUsize::new(0),
        }
    }

    /// Follow-ups are held until `parties` calls are in flight
    pub fn rendezvous(parties: usize) -> Self {
        Self {
            barrier: Some(Arc::new(Barrier::new(parties))),
            ..Self::new()
        }
    }

    pub fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::new()
        }
    }

    pub fn first_count(&self) -> usize {
        self.first_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate_first(&self, _analysis: &ContentAnalysis) -> Result<Generated<Question>> {
        self.first_calls.fetch_add(1, Ordering::SeqCst);
        if self.malformed {
            return Ok(Generated::malformed("Sure! Here is a question"));
        }
        Ok(Generated::Valid(question("What brings you to Acme today?")))
    }

    async fn generate_next(
        &self,
        _analysis: &ContentAnalysis,
        history: &[Response],
    ) -> Result<Generated<Question>> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.malformed {
            return Err(ProfilerError::Upstream("connection reset".to_string()));
        }
        Ok(Generated::Valid(question(&format!(
            "Follow-up after {} answers?",
            history.len()
        ))))
    }
}

/// Oracle replaying a fixed list of decisions, `false` once exhausted
pub struct ScriptedOracle {
    pub decisions: Mutex<VecDeque<bool>>,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(decisions: &[bool]) -> Self {
        Self {
            decisions: Mutex::new(decisions.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StopOracle for ScriptedOracle {
    async fn should_stop(&self, _analysis: &ContentAnalysis, _history: &[Response]) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.decisions.lock().unwrap().pop_front().unwrap_or(false))
    }
}

pub struct ScriptedClassifier {
    pub draft: Option<ClassificationDraft>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn returning(draft: ClassificationDraft) -> Self {
        Self {
            draft: Some(draft),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            draft: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        _analysis: &ContentAnalysis,
        _history: &[Response],
    ) -> Result<Generated<ClassificationDraft>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.draft {
            Some(draft) => Ok(Generated::Valid(draft.clone())),
            None => Err(ProfilerError::Timeout {
                timeout_ms: 30_000,
                context: "classify".to_string(),
            }),
        }
    }
}

/// Hot-cache backend that is always down
pub struct DownBackend;

#[async_trait]
impl HotCacheBackend for DownBackend {
    async fn get(&self, _key: &str) -> profiler_cache::Result<Option<CacheValue>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn set(&self, _key: &str, _value: CacheValue, _ttl: Duration) -> profiler_cache::Result<()> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn delete(&self, _keys: &[CacheKey]) -> profiler_cache::Result<usize> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn incr(&self, _key: &str, _ttl: Duration) -> profiler_cache::Result<u64> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> profiler_cache::Result<bool> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
    async fn keys(&self, _prefix: &str) -> profiler_cache::Result<Vec<CacheKey>> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// In-memory backend whose writes can be switched off
#[derive(Default)]
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    pub fail_writes: AtomicBool,
}

impl FlakyBackend {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl HotCacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> profiler_cache::Result<Option<CacheValue>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> profiler_cache::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("write rejected".into()));
        }
        self.inner.set(key, value, ttl).await
    }
    async fn delete(&self, keys: &[CacheKey]) -> profiler_cache::Result<usize> {
        self.inner.delete(keys).await
    }
    async fn incr(&self, key: &str, ttl: Duration) -> profiler_cache::Result<u64> {
        self.inner.incr(key, ttl).await
    }
    async fn expire(&self, key: &str, ttl: Duration) -> profiler_cache::Result<bool> {
        self.inner.expire(key, ttl).await
    }
    async fn keys(&self, prefix: &str) -> profiler_cache::Result<Vec<CacheKey>> {
        self.inner.keys(prefix).await
    }
}

/// A profiler wired to scripted collaborators, with handles kept for assertions
pub struct Harness {
    pub profiler: Arc<Profiler>,
    pub scraper: Arc<StaticScraper>,
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub generator: Arc<ScriptedGenerator>,
    pub oracle: Arc<ScriptedOracle>,
    pub classifier: Arc<ScriptedClassifier>,
    pub store: Arc<dyn DurableStore>,
    pub cache: Arc<TieredCache>,
}

pub struct HarnessBuilder {
    pub config: ProfilerConfig,
    pub scraper: StaticScraper,
    pub analyzer: ScriptedAnalyzer,
    pub generator: ScriptedGenerator,
    pub oracle: ScriptedOracle,
    pub classifier: ScriptedClassifier,
    pub store: Option<Arc<dyn DurableStore>>,
    pub cache: Option<Arc<TieredCache>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            scraper: StaticScraper::serving(page()),
            analyzer: ScriptedAnalyzer::valid(),
            generator: ScriptedGenerator::new(),
            oracle: ScriptedOracle::new(&[]),
            classifier: ScriptedClassifier::returning(good_draft()),
            store: None,
            cache: None,
        }
    }

    pub fn with_down_cache(mut self) -> Self {
        let cache = TieredCache::new(CacheConfig::default(), Arc::new(DownBackend)).unwrap();
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn with_cache_backend(mut self, backend: Arc<dyn HotCacheBackend>) -> Self {
        let cache = TieredCache::new(self.config.cache.to_cache_config(), backend).unwrap();
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn build(self) -> Harness {
        let scraper = Arc::new(self.scraper);
        let analyzer = Arc::new(self.analyzer);
        let generator = Arc::new(self.generator);
        let oracle = Arc::new(self.oracle);
        let classifier = Arc::new(self.classifier);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn DurableStore>);
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(TieredCache::in_memory(self.config.cache.to_cache_config()).unwrap())
        });

        let profiler = Profiler::new(
            ProfilerDeps {
                scraper: scraper.clone(),
                analyzer: analyzer.clone(),
                generator: generator.clone(),
                oracle: oracle.clone(),
                classifier: classifier.clone(),
                store: store.clone(),
                cache: cache.clone(),
            },
            &self.config,
        )
        .unwrap();

        Harness {
            profiler: Arc::new(profiler),
            scraper,
            analyzer,
            generator,
            oracle,
            classifier,
            store,
            cache,
        }
    }
}
