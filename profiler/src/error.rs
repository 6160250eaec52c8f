//! Error types for the profiling pipeline
//!
//! Callers branch on the kind, not on catching a generic failure. Only
//! `Fetch`, `SessionNotFound`, `SessionConflict`, `SessionNotTerminal`,
//! `InvalidInput` and session-creation `Persistence` failures ever reach a
//! client; the remaining kinds are absorbed by fallbacks inside the pipeline.

use profiler_cache::CacheError;
use thiserror::Error;

/// Main error type for profiling operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    /// Origin unreachable or returned a non-2xx status
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Hot-tier backend error or timeout
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// A model or other upstream service call failed in transport
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Generator or classifier output failed schema or quality checks
    #[error("Malformed generation output: {0}")]
    GenerationMalformed(String),

    /// Neither the cache nor the durable store knows the session
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Another writer updated the session first
    #[error("Session {session_id} was modified concurrently (expected version {expected}, found {found})")]
    SessionConflict {
        session_id: String,
        expected: u64,
        found: u64,
    },

    /// Classification requested before the question loop finished
    #[error("Session {0} has not finished questioning")]
    SessionNotTerminal(String),

    /// Durable store unavailable or rejected a write
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Classification failed the quality gate
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad client input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// External call exceeded its deadline
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProfilerError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ProfilerError::Fetch { .. } => "fetch_error",
            ProfilerError::CacheUnavailable(_) => "cache_unavailable",
            ProfilerError::Upstream(_) => "upstream_error",
            ProfilerError::GenerationMalformed(_) => "generation_malformed",
            ProfilerError::SessionNotFound(_) => "session_not_found",
            ProfilerError::SessionConflict { .. } => "session_conflict",
            ProfilerError::SessionNotTerminal(_) => "session_not_terminal",
            ProfilerError::Persistence(_) => "persistence_error",
            ProfilerError::Validation(_) => "validation_error",
            ProfilerError::InvalidInput(_) => "invalid_input",
            ProfilerError::Timeout { .. } => "timeout",
            ProfilerError::Config(_) => "config_error",
            ProfilerError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the error is caused by the client's request rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProfilerError::SessionNotFound(_)
                | ProfilerError::SessionConflict { .. }
                | ProfilerError::SessionNotTerminal(_)
                | ProfilerError::InvalidInput(_)
        )
    }

    /// Whether a retry of the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProfilerError::Fetch { .. }
                | ProfilerError::Upstream(_)
                | ProfilerError::CacheUnavailable(_)
                | ProfilerError::Persistence(_)
                | ProfilerError::Timeout { .. }
        )
    }
}

/// Result type alias for profiling operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

impl From<CacheError> for ProfilerError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Config(msg) => ProfilerError::Config(msg),
            other => ProfilerError::CacheUnavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ProfilerError {
    fn from(e: serde_json::Error) -> Self {
        ProfilerError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for ProfilerError {
    fn from(e: std::io::Error) -> Self {
        ProfilerError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ProfilerError::SessionNotFound("abc".to_string());
        assert_eq!(error.to_string(), "Session not found: abc");

        let conflict = ProfilerError::SessionConflict {
            session_id: "abc".to_string(),
            expected: 2,
            found: 3,
        };
        assert!(conflict.to_string().contains("expected version 2, found 3"));

        let timeout = ProfilerError::Timeout {
            timeout_ms: 1500,
            context: "scrape https://example.com".to_string(),
        };
        assert!(timeout.to_string().contains("timed out after 1500ms"));
    }

    #[test]
    fn test_cache_error_conversion() {
        let error: ProfilerError = CacheError::Unavailable("down".into()).into();
        assert!(matches!(error, ProfilerError::CacheUnavailable(_)));

        let error: ProfilerError = CacheError::Timeout {
            timeout_ms: 5,
            operation: "get".into(),
        }
        .into();
        assert!(matches!(error, ProfilerError::CacheUnavailable(_)));

        let error: ProfilerError = CacheError::Config("bad".into()).into();
        assert!(matches!(error, ProfilerError::Config(_)));
    }

    #[test]
    fn test_error_classification() {
        assert!(ProfilerError::SessionNotFound("x".into()).is_client_error());
        assert!(ProfilerError::InvalidInput("x".into()).is_client_error());
        assert!(!ProfilerError::Persistence("x".into()).is_client_error());

        assert!(ProfilerError::Persistence("x".into()).is_transient());
        assert!(!ProfilerError::SessionNotFound("x".into()).is_transient());

        assert_eq!(
            ProfilerError::Fetch {
                url: "u".into(),
                reason: "r".into()
            }
            .kind(),
            "fetch_error"
        );
    }
}
