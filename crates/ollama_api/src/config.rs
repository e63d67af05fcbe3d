use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_OLLAMA_BASE_URL;

/// Transport configuration for Ollama API requests.
#[derive(Debug, Clone)]
pub struct OllamaApiConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Model options forwarded verbatim in the request `options` object.
    pub options: BTreeMap<String, String>,
    /// Optional connect timeout. Streams themselves are never timed out.
    pub connect_timeout: Option<Duration>,
}

impl Default for OllamaApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            user_agent: None,
            options: BTreeMap::new(),
            connect_timeout: None,
        }
    }
}

impl OllamaApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn insert_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = (String, String)>) -> Self {
        self.options.extend(options);
        self
    }
}
