//! Transport-only Ollama chat API client primitives.
//!
//! This crate owns request building and NDJSON response parsing for the
//! `/api/chat` streaming endpoint only. It contains no conversation memory and
//! no terminal coupling; cancellation is cooperative through a shared flag.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod ndjson;
pub mod payload;
pub mod url;

pub use client::{CancellationSignal, OllamaApiClient, StreamResult};
pub use config::OllamaApiConfig;
pub use error::OllamaApiError;
pub use events::OllamaStreamEvent;
pub use ndjson::NdjsonStreamParser;
pub use payload::{ChatMessage, ChatRole, OllamaChatRequest};
pub use url::{normalize_chat_url, DEFAULT_OLLAMA_BASE_URL};
