pub mod api;
pub mod classification;
pub mod collaborators;
pub mod config;
pub mod content;
pub mod error;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod resilience;
pub mod scraper;
pub mod session;
pub mod store;

pub use api::{ApiServer, ApiServerConfig};
pub use classification::{ClassificationOrchestrator, QualityGate, QualityIssue};
pub use collaborators::{Classifier, ContentAnalyzer, QuestionGenerator, Scraper, StopOracle};
pub use config::{ProfilerConfig, SessionConfig, StoreKind, TimeoutConfig};
pub use content::{ContentHash, ContentHasher, NormalizationConfig, ScrapedContent, Section};
pub use error::{ProfilerError, Result};
pub use model::{
    Classification, ClassificationDraft, ClassificationSource, ContentAnalysis, ContentRecord,
    Generated, Question, Response, Session, SessionState,
};
pub use pipeline::{AnswerOutcome, Profiler, ProfilerDeps, StartOutcome};
pub use resilience::RetryPolicy;
pub use session::{RespondOutcome, SessionStateMachine};
pub use store::{DurableStore, FileStore, GuardedStore, MemoryStore};
