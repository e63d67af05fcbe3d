//! Ollama-backed implementation of the shared `chat_provider` contract.
//!
//! This adapter translates `ollama_api` stream semantics into the
//! `StreamEvent` lifecycle consumed by `sc_cli`, and keeps the message history
//! of each conversation so follow-up prompts carry context.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chat_provider::{
    CancelToken, ChatProvider, ChatRequest, ImageAttachment, ProviderInitError, ProviderProfile,
    StreamEvent,
};
use ollama_api::{
    CancellationSignal, ChatMessage, OllamaApiClient, OllamaApiConfig, OllamaApiError,
    OllamaChatRequest, OllamaStreamEvent,
};
use tracing::{debug, error, warn};

/// Stable provider identifier used by `sc_cli` startup selection.
pub const OLLAMA_PROVIDER_ID: &str = "ollama";

/// Model used when neither the request nor the configuration names one.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Runtime configuration for the Ollama provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OllamaProviderConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub options: BTreeMap<String, String>,
    pub connect_timeout: Option<Duration>,
}

impl OllamaProviderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> OllamaApiConfig {
        let mut config = OllamaApiConfig::default()
            .with_user_agent(concat!("sc/", env!("CARGO_PKG_VERSION")))
            .with_options(self.options);

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn stream(
        &self,
        request: &OllamaChatRequest,
        cancel: &CancellationSignal,
        on_event: &mut dyn FnMut(OllamaStreamEvent),
    ) -> Result<Option<String>, OllamaApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: OllamaApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn stream(
        &self,
        request: &OllamaChatRequest,
        cancel: &CancellationSignal,
        on_event: &mut dyn FnMut(OllamaStreamEvent),
    ) -> Result<Option<String>, OllamaApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                OllamaApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(request, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `ChatProvider` adapter backed by `ollama_api` transport primitives.
pub struct OllamaProvider {
    model_id: String,
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
    stream_client: Arc<dyn StreamClient>,
}

impl OllamaProvider {
    /// Creates a provider using real Ollama HTTP transport.
    pub fn new(config: OllamaProviderConfig) -> Result<Self, ProviderInitError> {
        let model_id = sanitize_model_id(config.model.clone());
        let stream_client = Arc::new(DefaultStreamClient {
            client: OllamaApiClient::new(config.into_api_config()).map_err(map_init_error)?,
        });

        Ok(Self {
            model_id,
            conversations: Mutex::new(HashMap::new()),
            stream_client,
        })
    }

    /// Snapshot of the stored turns for one conversation.
    fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        lock_unpoisoned(&self.conversations)
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    fn record_exchange(&self, conversation_id: &str, user: ChatMessage, reply: String) {
        let mut conversations = lock_unpoisoned(&self.conversations);
        let turns = conversations.entry(conversation_id.to_string()).or_default();
        turns.push(user);
        turns.push(ChatMessage::assistant(reply));
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(
        model_id: Option<String>,
        stream_client: Arc<dyn StreamClient>,
    ) -> Self {
        Self {
            model_id: sanitize_model_id(model_id),
            conversations: Mutex::new(HashMap::new()),
            stream_client,
        }
    }
}

impl ChatProvider for OllamaProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: OLLAMA_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn stream(
        &self,
        req: ChatRequest,
        cancel: CancelToken,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String> {
        let request_id = req.request_id;

        emit(StreamEvent::Started { request_id });

        if cancel.is_cancelled() {
            emit(StreamEvent::Cancelled { request_id });
            return Ok(());
        }

        let model = req
            .model
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.model_id)
            .to_string();
        let user = ChatMessage::user(req.text).with_images(encode_images(&req.images));
        let mut messages = self.history(&req.conversation_id);
        messages.push(user.clone());

        debug!(
            request_id,
            model = %model,
            conversation_id = %req.conversation_id,
            turns = messages.len(),
            "opening ollama stream"
        );

        let request = OllamaChatRequest::new(model, messages);
        let mut reply = String::new();
        let result = self.stream_client.stream(
            &request,
            &cancel.shared_flag(),
            &mut |event| {
                if let OllamaStreamEvent::MessageDelta { content } = event {
                    reply.push_str(&content);
                    emit(StreamEvent::Chunk {
                        request_id,
                        text: content,
                    });
                }
            },
        );

        match result {
            Ok(_) if cancel.is_cancelled() => emit(StreamEvent::Cancelled { request_id }),
            Ok(done_reason) => {
                debug!(request_id, done_reason = ?done_reason, "ollama stream finished");
                self.record_exchange(&req.conversation_id, user, reply);
                emit(StreamEvent::Finished { request_id });
            }
            Err(OllamaApiError::Cancelled) => emit(StreamEvent::Cancelled { request_id }),
            Err(failure) => {
                error!(request_id, error = %failure, "ollama stream failed");
                emit(StreamEvent::Failed {
                    request_id,
                    error: failure.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Reads and base64-encodes attachments. Unreadable files are skipped.
fn encode_images(images: &[ImageAttachment]) -> Vec<String> {
    images
        .iter()
        .filter_map(|image| match std::fs::read(&image.path) {
            Ok(bytes) => Some(STANDARD.encode(bytes)),
            Err(read_error) => {
                warn!(
                    path = %image.path.display(),
                    error = %read_error,
                    "skipping unreadable image attachment"
                );
                None
            }
        })
        .collect()
}

fn sanitize_model_id(model_id: Option<String>) -> String {
    model_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string())
}

fn map_init_error(error: OllamaApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize ollama provider: {error}"))
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
