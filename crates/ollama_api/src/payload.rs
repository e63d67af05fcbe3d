use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request payload for the `/api/chat` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl OllamaChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            options: Map::new(),
        }
    }

    /// Adds string-valued options, coercing numbers and booleans to their JSON
    /// types so `temperature=0.2` is sent as a number.
    pub fn with_options<'a>(
        mut self,
        options: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        for (key, value) in options {
            self.options.insert(key.clone(), option_value(value));
        }
        self
    }
}

pub(crate) fn merge_options(
    request: &OllamaChatRequest,
    defaults: &BTreeMap<String, String>,
) -> Map<String, Value> {
    let mut merged = Map::new();
    for (key, value) in defaults {
        merged.insert(key.clone(), option_value(value));
    }
    for (key, value) in &request.options {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn option_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Base64-encoded image payloads attached to a user message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}
