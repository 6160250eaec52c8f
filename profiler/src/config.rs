//! Service configuration
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `PROFILER_*` / `OPENAI_*` environment variables (a `.env` file is loaded
//! by the binary before this runs). CLI flags override the result last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use profiler_cache::CacheConfig;

use crate::classification::QualityGate;
use crate::content::NormalizationConfig;
use crate::error::{ProfilerError, Result};
use crate::resilience::{millis, RetryPolicy};

/// Top-level configuration for the profiler service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub scraper: ScraperConfig,
    pub cache: CacheSettings,
    pub session: SessionConfig,
    pub quality: QualityGate,
    pub normalization: NormalizationConfig,
    pub timeouts: TimeoutConfig,
    pub retry: RetryPolicy,
    pub llm: LlmConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Which durable store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    File,
}

impl std::str::FromStr for StoreKind {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "file" => Ok(StoreKind::File),
            other => Err(ProfilerError::Config(format!(
                "unknown store kind '{}', expected 'memory' or 'file'",
                other
            ))),
        }
    }
}

/// Durable tier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StoreKind,
    pub data_dir: PathBuf,
    /// Lifetime of a content record in the durable tier
    pub content_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            data_dir: default_data_dir(),
            content_ttl_secs: 7 * 24 * 3600,
        }
    }
}

impl StorageConfig {
    pub fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.content_ttl_secs)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("profiler"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Page fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Pages larger than this are rejected as fetch failures
    pub max_page_bytes: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_page_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Hot tier settings, converted into a [`CacheConfig`] at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub content_ttl_secs: u64,
    pub first_question_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub classification_ttl_secs: u64,
    pub operation_timeout_ms: u64,
    pub ttl_jitter: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            capacity: defaults.max_entries,
            content_ttl_secs: defaults.content_ttl.as_secs(),
            first_question_ttl_secs: defaults.first_question_ttl.as_secs(),
            session_ttl_secs: defaults.session_ttl.as_secs(),
            classification_ttl_secs: defaults.classification_ttl.as_secs(),
            operation_timeout_ms: defaults.operation_timeout.as_millis() as u64,
            ttl_jitter: defaults.ttl_jitter,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::builder()
            .max_entries(self.capacity)
            .content_ttl(Duration::from_secs(self.content_ttl_secs))
            .first_question_ttl(Duration::from_secs(self.first_question_ttl_secs))
            .session_ttl(Duration::from_secs(self.session_ttl_secs))
            .classification_ttl(Duration::from_secs(self.classification_ttl_secs))
            .operation_timeout(Duration::from_millis(self.operation_timeout_ms))
            .ttl_jitter(self.ttl_jitter)
            .build()
    }
}

/// Question loop bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Responses required before the stop oracle is consulted
    pub min_questions: usize,
    /// Responses after which the session stops unconditionally
    pub max_questions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_questions: 2,
            max_questions: 5,
        }
    }
}

impl SessionConfig {
    pub fn new(min_questions: usize, max_questions: usize) -> Self {
        Self {
            min_questions,
            max_questions,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_questions == 0 {
            return Err(ProfilerError::Config(
                "min_questions must be at least 1".to_string(),
            ));
        }
        if self.min_questions > self.max_questions {
            return Err(ProfilerError::Config(format!(
                "min_questions ({}) must not exceed max_questions ({})",
                self.min_questions, self.max_questions
            )));
        }
        Ok(())
    }
}

/// Deadlines for every call that leaves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "millis")]
    pub scrape: Duration,
    #[serde(with = "millis")]
    pub analyze: Duration,
    #[serde(with = "millis")]
    pub generate: Duration,
    #[serde(with = "millis")]
    pub oracle: Duration,
    #[serde(with = "millis")]
    pub classify: Duration,
    #[serde(with = "millis")]
    pub durable: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            scrape: Duration::from_secs(10),
            analyze: Duration::from_secs(30),
            generate: Duration::from_secs(30),
            oracle: Duration::from_secs(15),
            classify: Duration::from_secs(30),
            durable: Duration::from_secs(2),
        }
    }
}

/// Chat-completions endpoint used by the default collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub analysis_model: String,
    pub question_model: String,
    pub classification_model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            analysis_model: "gpt-4o-2024-11-20".to_string(),
            question_model: "gpt-4o-2024-11-20".to_string(),
            classification_model: "gpt-4o-2024-11-20".to_string(),
            temperature: 0.7,
        }
    }
}

impl ProfilerConfig {
    /// Load from an optional YAML file, then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProfilerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| ProfilerError::Config(format!("invalid YAML configuration: {}", e)))
    }

    /// Overlay variables resolved through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PROFILER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PROFILER_PORT") {
            self.server.port = parse_var("PROFILER_PORT", &port)?;
        }
        if let Some(kind) = lookup("PROFILER_STORE") {
            self.storage.kind = kind.parse()?;
        }
        if let Some(dir) = lookup("PROFILER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = lookup("PROFILER_CONTENT_RECORD_TTL_SECS") {
            self.storage.content_ttl_secs = parse_var("PROFILER_CONTENT_RECORD_TTL_SECS", &ttl)?;
        }
        if let Some(limit) = lookup("PROFILER_MAX_PAGE_BYTES") {
            self.scraper.max_page_bytes = parse_var("PROFILER_MAX_PAGE_BYTES", &limit)?;
        }
        if let Some(capacity) = lookup("PROFILER_CACHE_CAPACITY") {
            self.cache.capacity = parse_var("PROFILER_CACHE_CAPACITY", &capacity)?;
        }
        if let Some(ttl) = lookup("PROFILER_CONTENT_TTL_SECS") {
            let secs = parse_var("PROFILER_CONTENT_TTL_SECS", &ttl)?;
            self.cache.content_ttl_secs = secs;
            self.cache.first_question_ttl_secs = secs;
        }
        if let Some(ttl) = lookup("PROFILER_SESSION_TTL_SECS") {
            self.cache.session_ttl_secs = parse_var("PROFILER_SESSION_TTL_SECS", &ttl)?;
        }
        if let Some(min) = lookup("PROFILER_MIN_QUESTIONS") {
            self.session.min_questions = parse_var("PROFILER_MIN_QUESTIONS", &min)?;
        }
        if let Some(max) = lookup("PROFILER_MAX_QUESTIONS") {
            self.session.max_questions = parse_var("PROFILER_MAX_QUESTIONS", &max)?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_CONTENT_MODEL") {
            self.llm.analysis_model = model;
        }
        if let Some(model) = lookup("OPENAI_QUESTION_MODEL") {
            self.llm.question_model = model;
        }
        if let Some(model) = lookup("OPENAI_CLASSIFICATION_MODEL") {
            self.llm.classification_model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        self.cache
            .to_cache_config()
            .validate()
            .map_err(ProfilerError::Config)?;
        if self.quality.min_relevant_sections == 0 {
            return Err(ProfilerError::Config(
                "quality.min_relevant_sections must be at least 1".to_string(),
            ));
        }
        if self.scraper.max_page_bytes == 0 {
            return Err(ProfilerError::Config(
                "scraper.max_page_bytes must be greater than 0".to_string(),
            ));
        }
        if self.storage.content_ttl_secs == 0 {
            return Err(ProfilerError::Config(
                "storage.content_ttl_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProfilerError::Config(format!("{} has invalid value '{}'", name, value)))
}
