//! Error types for hot-cache operations
//!
//! Every failure of the backing store, including a timed out round trip,
//! is reported as [`CacheError::Unavailable`]. Callers are expected to treat
//! it as a miss and fall through to the next tier.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backing store error on any tier operation
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Backend round trip exceeded its deadline
    #[error("Cache operation timed out after {timeout_ms}ms: {operation}")]
    Timeout { timeout_ms: u64, operation: String },

    /// A cached payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Whether the error should be treated as a cache miss by callers.
    ///
    /// Only configuration mistakes are programmer errors; everything else is
    /// a transient condition of the best-effort cache.
    pub fn is_miss_equivalent(&self) -> bool {
        !matches!(self, CacheError::Config(_))
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}
