//! OpenAI chat-completions backend.

use serde_json::{json, Value};

use crate::error::SummarizeError;
use crate::http;
use crate::prompt;
use crate::Summarizer;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";
const TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct OpenAiSummarizer {
    api_key: String,
    model: String,
    language: String,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            language: language.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(&self, activity: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt::system_prompt(&self.language) },
                { "role": "user", "content": prompt::user_message(activity) },
            ],
            "temperature": TEMPERATURE,
        })
    }
}

impl Summarizer for OpenAiSummarizer {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn summarize(&self, activity: &str) -> Result<String, SummarizeError> {
        tracing::info!(model = %self.model, bytes = activity.len(), "requesting openai summary");
        let request = http::agent()
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.api_key));
        let reply = http::post_json(request, &self.request_body(activity), PROVIDER, &self.model)?;
        extract_text(&reply).ok_or_else(|| SummarizeError::EmptyResponse {
            provider: PROVIDER,
            detail: reply
                .pointer("/choices/0/finish_reason")
                .and_then(Value::as_str)
                .unwrap_or("no choices")
                .to_string(),
        })
    }
}

/// `choices[0].message.content`, trimmed; `None` if absent or blank.
pub fn extract_text(reply: &Value) -> Option<String> {
    let text = reply
        .pointer("/choices/0/message/content")?
        .as_str()?
        .trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_extracted() {
        let reply = json!({
            "choices": [{ "message": { "role": "assistant", "content": "  report  " }, "finish_reason": "stop" }]
        });
        assert_eq!(extract_text(&reply).as_deref(), Some("report"));
    }

    #[test]
    fn null_content_is_none() {
        let reply = json!({ "choices": [{ "message": { "content": null } }] });
        assert_eq!(extract_text(&reply), None);
    }

    #[test]
    fn body_has_system_and_user_messages() {
        let s = OpenAiSummarizer::new("k", "gpt-4o-mini", "German");
        let body = s.request_body("activity");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("German"));
        assert!(body["messages"][1]["content"].as_str().unwrap().ends_with("activity"));
    }
}
