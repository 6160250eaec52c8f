//! HTTP page fetcher with a lightweight HTML text extractor

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::collaborators::Scraper;
use crate::content::{ScrapedContent, Section};
use crate::error::{ProfilerError, Result};

/// Elements whose content never counts as visible page text
const EXCLUDED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "svg", "template", "iframe",
];

struct Patterns {
    comments: Regex,
    excluded: Vec<Regex>,
    title: Regex,
    block_tags: Regex,
    any_tag: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        comments: Regex::new(r"(?s)<!--.*?-->").expect("valid regex"),
        excluded: EXCLUDED_ELEMENTS
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid regex")
            })
            .collect(),
        title: Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("valid regex"),
        block_tags: Regex::new(
            r"(?i)</?(?:p|div|section|article|main|header|aside|h[1-6]|li|ul|ol|dl|dt|dd|br|hr|tr|table|blockquote|pre|figure|figcaption|form|label|button)\b[^>]*>",
        )
        .expect("valid regex"),
        any_tag: Regex::new(r"(?s)<[^>]*>").expect("valid regex"),
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split an HTML document into its title and visible text sections
pub fn extract_text(html: &str) -> (String, Vec<Section>) {
    let p = patterns();

    let title = p
        .title
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| collapse(&decode_entities(&p.any_tag.replace_all(m.as_str(), " "))))
        .unwrap_or_default();

    let mut body = p.comments.replace_all(html, " ").into_owned();
    body = p.title.replace_all(&body, " ").into_owned();
    for excluded in &p.excluded {
        body = excluded.replace_all(&body, " ").into_owned();
    }
    body = p.block_tags.replace_all(&body, "\n").into_owned();
    body = p.any_tag.replace_all(&body, " ").into_owned();
    let body = decode_entities(&body);

    let sections = body
        .lines()
        .map(collapse)
        .filter(|line| !line.is_empty())
        .map(Section::new)
        .collect();

    (title, sections)
}

/// [`Scraper`] backed by `reqwest`
#[derive(Clone)]
pub struct HttpScraper {
    client: Client,
    max_page_bytes: usize,
}

impl HttpScraper {
    pub fn new(timeout: Duration, max_page_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("profiler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProfilerError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_page_bytes,
        })
    }

    fn fetch_error(url: &str, reason: impl std::fmt::Display) -> ProfilerError {
        ProfilerError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch(&self, url: &str) -> Result<ScrapedContent> {
        info!("Fetching {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::fetch_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::fetch_error(url, format!("HTTP {}", status)));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let last_modified = header(LAST_MODIFIED);
        let etag = header(ETAG);

        let limit = self.max_page_bytes;
        if let Some(length) = response.content_length() {
            if length > limit as u64 {
                return Err(Self::fetch_error(
                    url,
                    format!("page is {} bytes, limit is {}", length, limit),
                ));
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::fetch_error(url, e))?
        {
            if body.len() + chunk.len() > limit {
                return Err(Self::fetch_error(
                    url,
                    format!("page exceeds {} bytes", limit),
                ));
            }
            body.extend_from_slice(&chunk);
        }
        let html = String::from_utf8_lossy(&body);
        let (title, sections) = extract_text(&html);
        debug!("Extracted {} sections from {}", sections.len(), url);

        Ok(ScrapedContent::new(url, title, sections).with_validators(last_modified, etag))
    }

    async fn is_unchanged(
        &self,
        url: &str,
        last_modified: Option<&str>,
        etag: Option<&str>,
    ) -> Result<bool> {
        if last_modified.is_none() && etag.is_none() {
            return Ok(false);
        }

        let mut request = self.client.head(url);
        if let Some(value) = last_modified {
            request = request.header(IF_MODIFIED_SINCE, value);
        }
        if let Some(value) = etag {
            request = request.header(IF_NONE_MATCH, value);
        }

        let response = request.send().await.map_err(|e| Self::fetch_error(url, e))?;
        Ok(response.status() == StatusCode::NOT_MODIFIED)
    }
}
