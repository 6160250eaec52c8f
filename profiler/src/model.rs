//! Domain records shared by the session, classification and storage layers

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::content::ContentHash;
use crate::error::{ProfilerError, Result};

/// Output of a generation collaborator after schema validation
///
/// `Malformed` carries the raw text that failed to parse or validate so the
/// caller can log it before substituting fallback content.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated<T> {
    Valid(T),
    Malformed { raw: String },
}

impl<T> Generated<T> {
    pub fn malformed(raw: impl Into<String>) -> Self {
        Generated::Malformed { raw: raw.into() }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Generated::Valid(_))
    }

    pub fn into_valid(self) -> Option<T> {
        match self {
            Generated::Valid(value) => Some(value),
            Generated::Malformed { .. } => None,
        }
    }
}

/// Content analysis produced by the analyzer collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub topics: Vec<String>,
    pub audience: Vec<String>,
    pub sections: Vec<String>,
}

impl ContentAnalysis {
    /// Fixed analysis substituted when the analyzer fails
    pub fn fallback() -> Self {
        Self {
            topics: vec!["General Content".to_string()],
            audience: vec!["Website Visitors".to_string()],
            sections: vec!["Main Content".to_string()],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(ProfilerError::GenerationMalformed(
                "analysis has no topics".to_string(),
            ));
        }
        Ok(())
    }
}

/// A question with a small set of selectable answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    pub const MIN_OPTIONS: usize = 3;
    pub const MAX_OPTIONS: usize = 5;

    pub fn new(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(ProfilerError::GenerationMalformed(
                "question text is empty".to_string(),
            ));
        }
        if !(Self::MIN_OPTIONS..=Self::MAX_OPTIONS).contains(&self.options.len()) {
            return Err(ProfilerError::GenerationMalformed(format!(
                "expected {}-{} options, got {}",
                Self::MIN_OPTIONS,
                Self::MAX_OPTIONS,
                self.options.len()
            )));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(ProfilerError::GenerationMalformed(
                "question has an empty option".to_string(),
            ));
        }
        Ok(())
    }

    /// Opening question used when generation fails
    pub fn fallback_first() -> Self {
        Self::new(
            "What interests you about this website?",
            vec![
                "Products and Features".to_string(),
                "Company Information".to_string(),
                "Support and Help".to_string(),
                "Other".to_string(),
            ],
        )
    }

    /// Follow-up question used when generation fails
    pub fn fallback_next() -> Self {
        Self::new(
            "What specific information are you looking for on this website?",
            vec![
                "More details about what was mentioned".to_string(),
                "Different topic or section".to_string(),
                "Specific features or capabilities".to_string(),
                "Additional information".to_string(),
            ],
        )
    }
}

/// One recorded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, no question issued yet
    Init,
    /// One outstanding question
    Questioning,
    /// Questioning finished, ready for classification
    Terminal,
}

/// One visitor's question/answer interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub url: String,
    pub content_hash: ContentHash,
    pub content_analysis: ContentAnalysis,
    pub current_question: Option<Question>,
    pub responses: Vec<Response>,
    pub state: SessionState,
    /// Incremented on every persist; used for compare-and-swap writes
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        url: impl Into<String>,
        content_hash: ContentHash,
        content_analysis: ContentAnalysis,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            url: url.into(),
            content_hash,
            content_analysis,
            current_question: None,
            responses: Vec::new(),
            state: SessionState::Init,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::Terminal
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn latest_answer(&self) -> Option<&str> {
        self.responses.last().map(|r| r.answer.as_str())
    }

    /// Make `question` the outstanding question
    pub fn issue(&mut self, question: Question) {
        self.current_question = Some(question);
        self.state = SessionState::Questioning;
        self.updated_at = Utc::now();
    }

    /// Append an answer to the outstanding question
    pub fn record_response(&mut self, answer: &str) -> Result<()> {
        if self.is_terminal() {
            return Err(ProfilerError::InvalidInput(format!(
                "session {} is already terminal",
                self.session_id
            )));
        }
        let question = self.current_question.as_ref().ok_or_else(|| {
            ProfilerError::InvalidInput(format!(
                "session {} has no outstanding question",
                self.session_id
            ))
        })?;
        let now = Utc::now();
        self.responses.push(Response {
            question: question.text.clone(),
            answer: answer.to_string(),
            timestamp: now,
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn terminate(&mut self) {
        self.current_question = None;
        self.state = SessionState::Terminal;
        self.updated_at = Utc::now();
    }
}

/// Analysis result stored durably for one (url, content hash) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub url: String,
    pub content_hash: ContentHash,
    pub title: String,
    pub raw_sections: Vec<String>,
    pub analysis: ContentAnalysis,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ContentRecord {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        self.created_at
            .checked_add_signed(ChronoDuration::seconds(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Classifier output before it is bound to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationDraft {
    pub interests: Vec<String>,
    #[serde(alias = "relevantSections")]
    pub relevant_sections: Vec<String>,
}

/// Where a classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Generated,
    Fallback,
}

/// Final profile of a visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub session_id: String,
    pub interests: Vec<String>,
    pub relevant_sections: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn from_draft(
        session_id: impl Into<String>,
        draft: ClassificationDraft,
        source: ClassificationSource,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            interests: draft.interests,
            relevant_sections: draft.relevant_sections,
            timestamp: Utc::now(),
            source,
        }
    }
}
