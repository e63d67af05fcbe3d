use serde::{Deserialize, Serialize};

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OllamaStreamEvent {
    /// Incremental assistant text.
    MessageDelta { content: String },
    /// Final line of a successful stream.
    Done { done_reason: Option<String> },
    /// Server-reported failure inside an otherwise successful HTTP response.
    Error { message: String },
}

impl OllamaStreamEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Wire shape of one NDJSON line from `/api/chat`.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseLine {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}
