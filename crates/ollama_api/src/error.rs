use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllamaApiError {
    #[error("model is required")]
    MissingModel,

    #[error("invalid request payload: {0}")]
    InvalidRequestPayload(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("stream failed: {message}")]
    StreamFailed { message: String },

    #[error("stream ended before the server reported completion")]
    Truncated,

    #[error("request was cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub error: Option<String>,
}

/// Extracts a user-facing message from a non-success response body.
///
/// Ollama reports failures as `{"error":"..."}`; anything else falls back to
/// the raw body, then to the status reason phrase.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty());

    if let Some(message) = parsed {
        return message;
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
