//! Configuration for the cache system

use crate::cache::types::CacheFamily;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the hot cache tier
///
/// - Content and first-question entries live long (they only change when the
///   page content hash changes)
/// - Session and classification entries are short-lived
/// - Jitter spreads expiry of entries written in bursts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of live value keys across all families
    pub max_entries: usize,

    /// TTL for content analysis entries
    pub content_ttl: Duration,

    /// TTL for generated first questions
    pub first_question_ttl: Duration,

    /// TTL for live session state
    pub session_ttl: Duration,

    /// TTL for resolved classifications
    pub classification_ttl: Duration,

    /// TTL jitter factor (0.0 - 1.0)
    pub ttl_jitter: f64,

    /// Deadline for a single backend round trip
    pub operation_timeout: Duration,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            // 1 day
            content_ttl: Duration::from_secs(24 * 3600),
            first_question_ttl: Duration::from_secs(24 * 3600),
            // 1 hour
            session_ttl: Duration::from_secs(3600),
            classification_ttl: Duration::from_secs(3600),
            ttl_jitter: 0.05,
            operation_timeout: Duration::from_millis(500),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.ttl_jitter < 0.0 || self.ttl_jitter > 1.0 {
            return Err("ttl_jitter must be between 0.0 and 1.0".to_string());
        }

        for family in CacheFamily::ALL {
            if self.ttl_for(family).is_zero() {
                return Err(format!("{} ttl must be greater than 0", family));
            }
        }

        if self.operation_timeout.is_zero() {
            return Err("operation_timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Base TTL of a key family
    pub fn ttl_for(&self, family: CacheFamily) -> Duration {
        match family {
            CacheFamily::Content => self.content_ttl,
            CacheFamily::FirstQuestion => self.first_question_ttl,
            CacheFamily::Session => self.session_ttl,
            CacheFamily::Classification => self.classification_ttl,
        }
    }

    /// Calculate the TTL of a family with jitter applied
    pub fn ttl_with_jitter(&self, family: CacheFamily) -> Duration {
        let base = self.ttl_for(family);
        if self.ttl_jitter == 0.0 {
            return base;
        }

        let base_secs = base.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.001);

        Duration::from_secs_f64(final_secs)
    }
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    max_entries: Option<usize>,
    content_ttl: Option<Duration>,
    first_question_ttl: Option<Duration>,
    session_ttl: Option<Duration>,
    classification_ttl: Option<Duration>,
    ttl_jitter: Option<f64>,
    operation_timeout: Option<Duration>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set TTL for content analysis entries
    pub fn content_ttl(mut self, ttl: Duration) -> Self {
        self.content_ttl = Some(ttl);
        self
    }

    /// Set TTL for first-question entries
    pub fn first_question_ttl(mut self, ttl: Duration) -> Self {
        self.first_question_ttl = Some(ttl);
        self
    }

    /// Set TTL for session entries
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    /// Set TTL for classification entries
    pub fn classification_ttl(mut self, ttl: Duration) -> Self {
        self.classification_ttl = Some(ttl);
        self
    }

    /// Use one TTL for every family
    pub fn uniform_ttl(self, ttl: Duration) -> Self {
        self.content_ttl(ttl)
            .first_question_ttl(ttl)
            .session_ttl(ttl)
            .classification_ttl(ttl)
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Set the per-operation backend deadline
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            content_ttl: self.content_ttl.unwrap_or(defaults.content_ttl),
            first_question_ttl: self
                .first_question_ttl
                .unwrap_or(defaults.first_question_ttl),
            session_ttl: self.session_ttl.unwrap_or(defaults.session_ttl),
            classification_ttl: self
                .classification_ttl
                .unwrap_or(defaults.classification_ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            operation_timeout: self.operation_timeout.unwrap_or(defaults.operation_timeout),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

/// Preset configurations for common deployments
impl CacheConfig {
    /// Small hot tier for memory-constrained environments
    pub fn small() -> Self {
        Self {
            max_entries: 1_000,
            ..Default::default()
        }
    }

    /// Long content horizon for sites that rarely change
    pub fn weekly_content() -> Self {
        Self {
            content_ttl: Duration::from_secs(7 * 24 * 3600),
            first_question_ttl: Duration::from_secs(7 * 24 * 3600),
            ..Default::default()
        }
    }
}
