//! Scraped page content and its stable fingerprint
//!
//! The hash covers a normalized projection of the page (URL, title and
//! section text). Fetch time and HTTP validators are never hashed, and the
//! projection is serialized with sorted keys, so two scrapes of an unchanged
//! page produce the same [`ContentHash`].

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// One structural block of visible page text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub text: String,
}

impl Section {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Output of the scraper collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub sections: Vec<Section>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ScrapedContent {
    pub fn new(url: impl Into<String>, title: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            sections,
            fetched_at: Utc::now(),
            last_modified: None,
            etag: None,
        }
    }

    pub fn with_validators(mut self, last_modified: Option<String>, etag: Option<String>) -> Self {
        self.last_modified = last_modified;
        self.etag = etag;
        self
    }

    /// Section texts joined into one document for the analyzer
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        if !self.title.is_empty() {
            text.push_str(&self.title);
        }
        for section in &self.sections {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&section.text);
        }
        text
    }

    pub fn section_texts(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.text.clone()).collect()
    }
}

/// Lowercase hex SHA-256 digest of normalized content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an existing digest, accepting only 64 hex characters
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How aggressively text is normalized before hashing
///
/// Stricter normalization means more page edits count as "unchanged" and
/// reuse the cached analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub collapse_whitespace: bool,
    pub lowercase: bool,
    pub strip_timestamps: bool,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            lowercase: false,
            strip_timestamps: true,
        }
    }
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\b\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?\b|\b\d{1,2}:\d{2}(?::\d{2})?\b",
        )
        .expect("valid timestamp regex")
    })
}

/// Derives [`ContentHash`] values from scraped content
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher {
    config: NormalizationConfig,
}

impl ContentHasher {
    pub fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizationConfig {
        &self.config
    }

    pub fn hash(&self, content: &ScrapedContent) -> ContentHash {
        let canonical = self.canonical_json(content);
        let digest = Sha256::digest(canonical.as_bytes());
        ContentHash(
            digest
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect(),
        )
    }

    /// Apply the configured normalization to one piece of text
    pub fn normalize(&self, text: &str) -> String {
        let mut text = if self.config.strip_timestamps {
            timestamp_pattern().replace_all(text, " ").into_owned()
        } else {
            text.to_string()
        };
        if self.config.lowercase {
            text = text.to_lowercase();
        }
        if self.config.collapse_whitespace {
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        } else {
            text = text.trim().to_string();
        }
        text
    }

    fn canonical_json(&self, content: &ScrapedContent) -> String {
        let sections: Vec<serde_json::Value> = content
            .sections
            .iter()
            .map(|s| self.normalize(&s.text))
            .filter(|text| !text.is_empty())
            .map(serde_json::Value::String)
            .collect();

        let mut projection: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
        projection.insert("url", serde_json::Value::String(content.url.trim().to_string()));
        projection.insert(
            "title",
            serde_json::Value::String(self.normalize(&content.title)),
        );
        projection.insert("sections", serde_json::Value::Array(sections));

        serde_json::to_string(&projection).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn page(sections: &[&str]) -> ScrapedContent {
        ScrapedContent::new(
            "https://example.com",
            "Example",
            sections.iter().map(|s| Section::new(*s)).collect(),
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = ContentHasher::default();
        let content = page(&["Products for teams", "Pricing plans"]);

        let first = hasher.hash(&content);
        let second = hasher.hash(&content);

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert!(ContentHash::parse(first.as_str()).is_some());
    }

    #[test]
    fn test_volatile_fields_are_ignored() {
        let hasher = ContentHasher::default();
        let mut a = page(&["Products for teams"]);
        let mut b = a.clone();
        b.fetched_at = a.fetched_at + Duration::hours(5);
        b.etag = Some("\"v2\"".to_string());
        a.last_modified = Some("Tue, 15 Nov 1994 08:12:31 GMT".to_string());

        assert_eq!(hasher.hash(&a), hasher.hash(&b));
    }

    #[test]
    fn test_inline_timestamps_and_whitespace_are_stripped() {
        let hasher = ContentHasher::default();
        let a = page(&["Updated 2024-03-01T10:15:00Z  new   release notes"]);
        let b = page(&["Updated 2024-05-09 08:30 new release notes"]);
        let c = page(&["Updated 17:45:02 new release notes"]);
        let d = page(&["Updated new release notes"]);

        assert_eq!(hasher.hash(&a), hasher.hash(&d));
        assert_eq!(hasher.hash(&b), hasher.hash(&d));
        assert_eq!(hasher.hash(&c), hasher.hash(&d));
    }

    #[test]
    fn test_timestamps_kept_when_stripping_disabled() {
        let hasher = ContentHasher::new(NormalizationConfig {
            strip_timestamps: false,
            ..NormalizationConfig::default()
        });
        assert_ne!(
            hasher.hash(&page(&["Updated 2024-03-01 notes"])),
            hasher.hash(&page(&["Updated 2024-03-02 notes"]))
        );
    }

    #[test]
    fn test_section_text_changes_hash() {
        let hasher = ContentHasher::default();
        assert_ne!(
            hasher.hash(&page(&["Pricing plans"])),
            hasher.hash(&page(&["Pricing tiers"]))
        );
    }

    #[test]
    fn test_empty_sections_are_dropped() {
        let hasher = ContentHasher::default();
        assert_eq!(
            hasher.hash(&page(&["Products", "   ", "Pricing"])),
            hasher.hash(&page(&["Products", "Pricing"]))
        );
    }

    #[test]
    fn test_lowercase_normalization_is_opt_in() {
        let strict = ContentHasher::default();
        let loose = ContentHasher::new(NormalizationConfig {
            lowercase: true,
            ..NormalizationConfig::default()
        });
        let a = page(&["Pricing Plans"]);
        let b = page(&["pricing plans"]);

        assert_ne!(strict.hash(&a), strict.hash(&b));
        assert_eq!(loose.hash(&a), loose.hash(&b));
    }

    #[test]
    fn test_content_hash_parse_rejects_non_hex() {
        assert!(ContentHash::parse("abc").is_none());
        assert!(ContentHash::parse(&"z".repeat(64)).is_none());
        assert_eq!(
            ContentHash::parse(&"AB".repeat(32)).map(|h| h.to_string()),
            Some("ab".repeat(32))
        );
    }

    #[test]
    fn test_full_text_joins_title_and_sections() {
        let content = page(&["one", "two"]);
        assert_eq!(content.full_text(), "Example\none\ntwo");
    }
}
