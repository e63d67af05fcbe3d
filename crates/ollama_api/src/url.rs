/// Default base URL of a local Ollama server.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Normalize a base URL to the Ollama chat endpoint.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_OLLAMA_BASE_URL`]
/// 2) keep `/api/chat` unchanged
/// 3) append `/chat` when path ends in `/api`
/// 4) append `/api/chat` otherwise
pub fn normalize_chat_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_OLLAMA_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/api/chat") {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/api") {
        return format!("{trimmed}/chat");
    }
    format!("{trimmed}/api/chat")
}
