//! Blocking HTTP plumbing shared by the backends.

use std::time::Duration;

use serde_json::Value;

use crate::error::SummarizeError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

pub(crate) fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("claw-log/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Send a prepared request with a JSON body and decode the JSON reply.
pub(crate) fn post_json(
    request: ureq::Request,
    body: &Value,
    provider: &'static str,
    model: &str,
) -> Result<Value, SummarizeError> {
    match request.send_json(body) {
        Ok(response) => response
            .into_json::<Value>()
            .map_err(|err| SummarizeError::EmptyResponse {
                provider,
                detail: format!("invalid JSON body: {err}"),
            }),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(classify_status(provider, model, status, &body))
        }
        Err(ureq::Error::Transport(transport)) => Err(SummarizeError::Transport {
            provider,
            message: transport.to_string(),
        }),
    }
}

/// Map an HTTP error status to the failure the operator can act on.
pub(crate) fn classify_status(
    provider: &'static str,
    model: &str,
    status: u16,
    body: &str,
) -> SummarizeError {
    match status {
        400 | 401 | 403 => SummarizeError::InvalidApiKey { provider, status },
        429 => SummarizeError::QuotaExceeded { provider },
        404 => SummarizeError::ModelNotFound {
            provider,
            model: model.to_string(),
        },
        _ => SummarizeError::Http {
            provider,
            status,
            body: abbreviate(body, 500),
        },
    }
}

fn abbreviate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
