//! Chat-completions backed analyzer, question generator, stop oracle and classifier
//!
//! Model replies are treated as untrusted text: code fences are stripped, the
//! JSON is decoded, then validated against the expected shape. Anything that
//! fails comes back as [`Generated::Malformed`] and the caller decides the
//! fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::collaborators::{Classifier, ContentAnalyzer, QuestionGenerator, StopOracle};
use crate::config::LlmConfig;
use crate::error::{ProfilerError, Result};
use crate::model::{ClassificationDraft, ContentAnalysis, Generated, Question, Response};

/// Upper bound on page text sent for analysis
const MAX_ANALYSIS_CHARS: usize = 12_000;

const ANALYZE_PROMPT: &str = "Analyze the website content and extract its key information. \
Reply with a JSON object with exactly these keys: \
{\"topics\": [string], \"audience\": [string], \"sections\": [string]}. \
Reply with the JSON object only, without markdown.";

const QUESTION_PROMPT: &str = "You help a website understand its visitors. \
Ask one question that reveals the visitor's interest or industry, based on the website content. \
The question must be specific to the content, offer 3 to 5 distinct options drawn from the \
content's topics and sections, never repeat a previous question, and become more specific as \
answers accumulate. Reply with JSON only: {\"question\": string, \"options\": [string]}.";

const STOP_PROMPT: &str = "Given the website analysis and the visitor's answers, decide whether \
there is enough specific information to classify the visitor's interests. \
Answer true only if the answers show a clear interest, the relevant content can be identified, \
and more questions would not improve understanding. Reply with exactly true or false.";

const CLASSIFY_PROMPT: &str = "Classify the visitor from their answers. \
Reply with JSON only: {\"interests\": [string], \"relevant_sections\": [string]}. \
Interests are short phrases. Give 2-3 relevant_sections, each a complete, detailed sentence \
describing specific website content that matches the interests. \
Avoid generic phrasing such as \"The website provides\".";

/// Remove Markdown code fences around a model reply
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. "json") on the opening fence line
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(body) = text.trim_end().strip_suffix("```") {
        text = body;
    }
    text.trim().trim_matches('`').trim()
}

/// Decode a model reply and validate it
pub fn parse_generated<T, F>(raw: &str, validate: F) -> Generated<T>
where
    T: DeserializeOwned,
    F: FnOnce(&T) -> Result<()>,
{
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<T>(cleaned) {
        Ok(value) => match validate(&value) {
            Ok(()) => Generated::Valid(value),
            Err(e) => {
                debug!("Rejected model output: {}", e);
                Generated::malformed(raw)
            }
        },
        Err(e) => {
            debug!("Undecodable model output: {}", e);
            Generated::malformed(raw)
        }
    }
}

/// Interpret a yes/no reply from the stop oracle
pub fn parse_decision(raw: &str) -> Result<bool> {
    match strip_code_fences(raw).trim_end_matches('.').to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        other => Err(ProfilerError::GenerationMalformed(format!(
            "expected true or false, got '{}'",
            other
        ))),
    }
}

fn validate_draft(draft: &ClassificationDraft) -> Result<()> {
    if draft.interests.is_empty() || draft.relevant_sections.is_empty() {
        return Err(ProfilerError::GenerationMalformed(
            "classification is missing interests or relevant sections".to_string(),
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// OpenAI-compatible chat-completions client implementing every generation
/// collaborator
#[derive(Clone)]
pub struct LanguageModel {
    client: Client,
    config: LlmConfig,
}

impl LanguageModel {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ProfilerError::Config(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProfilerError::Upstream(format!("model request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body);
            warn!("Model endpoint returned {}: {}", status, message);
            return Err(ProfilerError::Upstream(format!(
                "model endpoint returned {}: {}",
                status, message
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProfilerError::Upstream(format!("failed to decode model response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProfilerError::Upstream("model returned no content".to_string()))
    }
}

fn history_json(history: &[Response]) -> serde_json::Value {
    serde_json::Value::Array(
        history
            .iter()
            .map(|r| json!({ "question": r.question, "answer": r.answer }))
            .collect(),
    )
}

#[async_trait]
impl ContentAnalyzer for LanguageModel {
    async fn analyze(&self, text: &str) -> Result<Generated<ContentAnalysis>> {
        let text: String = text.chars().take(MAX_ANALYSIS_CHARS).collect();
        let raw = self
            .complete(
                &self.config.analysis_model,
                ANALYZE_PROMPT,
                &text,
                self.config.temperature,
            )
            .await?;
        Ok(parse_generated(&raw, ContentAnalysis::validate))
    }
}

#[async_trait]
impl QuestionGenerator for LanguageModel {
    async fn generate_first(&self, analysis: &ContentAnalysis) -> Result<Generated<Question>> {
        let context = json!({ "content_analysis": analysis, "previous_responses": [] });
        let user = format!(
            "Context: {}\nThis is the first question: focus on the visitor's primary interest or industry.",
            context
        );
        let raw = self
            .complete(
                &self.config.question_model,
                QUESTION_PROMPT,
                &user,
                self.config.temperature,
            )
            .await?;
        Ok(parse_generated(&raw, Question::validate))
    }

    async fn generate_next(
        &self,
        analysis: &ContentAnalysis,
        history: &[Response],
    ) -> Result<Generated<Question>> {
        let context = json!({
            "content_analysis": analysis,
            "previous_responses": history_json(history),
        });
        let last = history.last().map(|r| r.answer.as_str()).unwrap_or("none");
        let user = format!(
            "Context: {}\nAsk a follow-up that explores the previous answer in more depth: {}",
            context, last
        );
        let raw = self
            .complete(
                &self.config.question_model,
                QUESTION_PROMPT,
                &user,
                self.config.temperature,
            )
            .await?;
        Ok(parse_generated(&raw, Question::validate))
    }
}

#[async_trait]
impl StopOracle for LanguageModel {
    async fn should_stop(&self, analysis: &ContentAnalysis, history: &[Response]) -> Result<bool> {
        let user = json!({
            "content_analysis": analysis,
            "responses": history_json(history),
        })
        .to_string();
        let raw = self
            .complete(&self.config.question_model, STOP_PROMPT, &user, 0.3)
            .await?;
        parse_decision(&raw)
    }
}

#[async_trait]
impl Classifier for LanguageModel {
    async fn classify(
        &self,
        analysis: &ContentAnalysis,
        history: &[Response],
    ) -> Result<Generated<ClassificationDraft>> {
        let user = format!(
            "Content analysis: {}\nVisitor responses: {}",
            json!(analysis),
            history_json(history)
        );
        let raw = self
            .complete(
                &self.config.classification_model,
                CLASSIFY_PROMPT,
                &user,
                self.config.temperature,
            )
            .await?;
        Ok(parse_generated(&raw, validate_draft))
    }
}
