//! Google Gemini `generateContent` backend.

use serde_json::{json, Value};

use crate::error::SummarizeError;
use crate::http;
use crate::prompt;
use crate::Summarizer;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    api_key: String,
    model: String,
    language: String,
    base_url: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            language: language.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different host (proxy, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn request_body(&self, activity: &str) -> Value {
        let text = format!(
            "{}\n\n{}",
            prompt::system_prompt(&self.language),
            prompt::user_message(activity)
        );
        json!({ "contents": [{ "parts": [{ "text": text }] }] })
    }
}

impl Summarizer for GeminiSummarizer {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn summarize(&self, activity: &str) -> Result<String, SummarizeError> {
        tracing::info!(model = %self.model, bytes = activity.len(), "requesting gemini summary");
        let request = http::agent()
            .post(&self.endpoint())
            .set("x-goog-api-key", &self.api_key);
        let reply = http::post_json(request, &self.request_body(activity), PROVIDER, &self.model)?;
        extract_text(&reply).ok_or_else(|| SummarizeError::EmptyResponse {
            provider: PROVIDER,
            detail: finish_reason(&reply),
        })
    }
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(reply: &Value) -> Option<String> {
    let parts = reply
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn finish_reason(reply: &Value) -> String {
    reply
        .pointer("/candidates/0/finishReason")
        .or_else(|| reply.pointer("/promptFeedback/blockReason"))
        .and_then(Value::as_str)
        .unwrap_or("no candidates")
        .to_string()
}
