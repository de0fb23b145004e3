//! # clawlog-engine
//!
//! Turns collected development activity into a written report.
//!
//! Backends implement [`Summarizer`]; [`build_summarizer`] picks one from
//! the user's [`Config`]. Requests are blocking (`ureq`); a run makes at most
//! one call.

pub mod error;
pub mod gemini;
mod http;
pub mod openai;
pub mod prompt;

use clawlog_core::{Config, ConfigError, Provider};

pub use error::SummarizeError;
pub use gemini::GeminiSummarizer;
pub use openai::OpenAiSummarizer;

/// A text-generation backend.
pub trait Summarizer {
    /// Short provider name for logs and messages.
    fn provider(&self) -> &str;

    /// Produce the report for `activity` (the combined, labelled diffs).
    fn summarize(&self, activity: &str) -> Result<String, SummarizeError>;
}

/// Backend for `config.provider`. Fails only when no API key is configured.
pub fn build_summarizer(config: &Config) -> Result<Box<dyn Summarizer>, ConfigError> {
    let key = config.api_key()?;
    let model = config.model();
    let language = config.language.as_str();

    let summarizer: Box<dyn Summarizer> = match config.provider {
        Provider::Gemini => {
            let mut backend = GeminiSummarizer::new(key, model, language);
            if let Some(base) = &config.base_url {
                backend = backend.with_base_url(base.as_str());
            }
            Box::new(backend)
        }
        Provider::OpenAi => {
            let mut backend = OpenAiSummarizer::new(key, model, language);
            if let Some(base) = &config.base_url {
                backend = backend.with_base_url(base.as_str());
            }
            Box::new(backend)
        }
    };
    tracing::debug!(provider = summarizer.provider(), model, "summarizer ready");
    Ok(summarizer)
}
