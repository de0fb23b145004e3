//! Error types for clawlog-engine.

use thiserror::Error;

/// Why a summary could not be generated.
///
/// Display strings carry the remediation an operator needs.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("{provider} rejected the API key (HTTP {status}); check `api_key` in config.yaml or CLAW_LOG_API_KEY")]
    InvalidApiKey { provider: &'static str, status: u16 },

    #[error("{provider} quota exceeded or rate limited (HTTP 429); wait and retry, or check your plan/billing")]
    QuotaExceeded { provider: &'static str },

    #[error("{provider} model '{model}' not found (HTTP 404); check `model` in config.yaml or the provider's region availability")]
    ModelNotFound { provider: &'static str, model: String },

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not reach {provider}: {message}; check your network connection")]
    Transport {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned a response without text: {detail}")]
    EmptyResponse {
        provider: &'static str,
        detail: String,
    },
}
