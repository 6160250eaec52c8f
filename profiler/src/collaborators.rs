//! Contracts for the external services the pipeline depends on
//!
//! Everything here is injected into the state machine, orchestrator and
//! pipeline as `Arc<dyn Trait>`; default network-backed implementations live
//! in [`crate::scraper`] and [`crate::llm`].

use async_trait::async_trait;

use crate::content::ScrapedContent;
use crate::error::Result;
use crate::model::{ClassificationDraft, ContentAnalysis, Generated, Question, Response};

/// Fetches a page and extracts its visible text
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch `url`, failing with [`ProfilerError::Fetch`](crate::error::ProfilerError::Fetch)
    /// on network errors and non-2xx responses
    async fn fetch(&self, url: &str) -> Result<ScrapedContent>;

    /// Conditional revalidation against previously seen validators
    ///
    /// Returns `true` only when the origin confirms the page has not changed.
    async fn is_unchanged(
        &self,
        _url: &str,
        _last_modified: Option<&str>,
        _etag: Option<&str>,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Extracts topics, audience and sections from page text
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Generated<ContentAnalysis>>;
}

/// Produces the opening and follow-up questions
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_first(&self, analysis: &ContentAnalysis) -> Result<Generated<Question>>;

    async fn generate_next(
        &self,
        analysis: &ContentAnalysis,
        history: &[Response],
    ) -> Result<Generated<Question>>;
}

/// Decides whether enough answers have been collected
#[async_trait]
pub trait StopOracle: Send + Sync {
    async fn should_stop(&self, analysis: &ContentAnalysis, history: &[Response]) -> Result<bool>;
}

/// Produces a classification draft from the analysis and answers
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        analysis: &ContentAnalysis,
        history: &[Response],
    ) -> Result<Generated<ClassificationDraft>>;
}
