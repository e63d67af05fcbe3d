//! Minimal provider-agnostic contract for streaming one chat response.
//!
//! This crate defines only the request/event lifecycle shared by every chat
//! backend. It excludes transport details, wire payloads, and the terminal
//! session that consumes the stream.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifier for one streamed request.
pub type RequestId = u64;

/// Shared cooperative cancellation flag for one stream.
///
/// Clones observe the same flag. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the "not cancelled" state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns true only for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    /// Returns true once any clone has called [`CancelToken::cancel`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns the raw flag for transports that poll an `Arc<AtomicBool>`.
    #[must_use]
    pub fn shared_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Error returned while constructing/configuring a provider before any stream starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Image file attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub mime_type: &'static str,
}

impl ImageAttachment {
    /// Builds an attachment when `path` has a supported image extension.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let mime_type = image_mime_type(&path)?;
        Some(Self { path, mime_type })
    }
}

/// Maps a file extension to a supported image MIME type.
#[must_use]
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime_type)
}

/// Input required to open one response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub request_id: RequestId,
    pub conversation_id: String,
    /// Model override; providers fall back to their configured default.
    pub model: Option<String>,
    pub text: String,
    pub images: Vec<ImageAttachment>,
}

impl ChatRequest {
    /// Creates a text-only request.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        conversation_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            conversation_id: conversation_id.into(),
            model: None,
            text: text.into(),
            images: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }
}

/// Provider-emitted lifecycle event for a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Started { request_id: RequestId },
    Chunk { request_id: RequestId, text: String },
    Finished { request_id: RequestId },
    Failed { request_id: RequestId, error: String },
    Cancelled { request_id: RequestId },
}

impl StreamEvent {
    /// Returns the request identifier associated with this event.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Started { request_id }
            | Self::Chunk { request_id, .. }
            | Self::Finished { request_id }
            | Self::Failed { request_id, .. }
            | Self::Cancelled { request_id } => *request_id,
        }
    }

    /// Returns true when this event terminates the stream lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing a chat provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for streaming one chat response.
pub trait ChatProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Streams a response and emits lifecycle events in provider order.
    ///
    /// Runs on a caller-owned worker thread and may block. Providers must check
    /// `cancel` between chunks and end with a terminal event; returning `Err`
    /// is equivalent to emitting [`StreamEvent::Failed`].
    fn stream(
        &self,
        req: ChatRequest,
        cancel: CancelToken,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalProvider;

    impl ChatProvider for MinimalProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                provider_id: "minimal".to_string(),
                model_id: "minimal-model".to_string(),
            }
        }

        fn stream(
            &self,
            req: ChatRequest,
            _cancel: CancelToken,
            emit: &mut dyn FnMut(StreamEvent),
        ) -> Result<(), String> {
            emit(StreamEvent::Started {
                request_id: req.request_id,
            });
            emit(StreamEvent::Finished {
                request_id: req.request_id,
            });
            Ok(())
        }
    }

    #[test]
    fn stream_event_request_id_returns_event_request_id() {
        let request_id = 42;
        let events = [
            StreamEvent::Started { request_id },
            StreamEvent::Chunk {
                request_id,
                text: "partial".to_string(),
            },
            StreamEvent::Finished { request_id },
            StreamEvent::Failed {
                request_id,
                error: "failure".to_string(),
            },
            StreamEvent::Cancelled { request_id },
        ];

        for event in events {
            assert_eq!(event.request_id(), request_id);
        }
    }

    #[test]
    fn stream_event_terminal_detection_matches_lifecycle() {
        assert!(!StreamEvent::Started { request_id: 1 }.is_terminal());
        assert!(!StreamEvent::Chunk {
            request_id: 1,
            text: "hello".to_string(),
        }
        .is_terminal());
        assert!(StreamEvent::Finished { request_id: 1 }.is_terminal());
        assert!(StreamEvent::Failed {
            request_id: 1,
            error: "boom".to_string(),
        }
        .is_terminal());
        assert!(StreamEvent::Cancelled { request_id: 1 }.is_terminal());
    }

    #[test]
    fn cancel_token_clones_share_state_and_flip_once() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        assert!(token.cancel());
        assert!(!clone.cancel());
        assert!(clone.is_cancelled());
        assert!(token.shared_flag().load(Ordering::Acquire));
    }

    #[test]
    fn provider_init_error_preserves_message() {
        let error = ProviderInitError::new("missing base url");
        assert_eq!(error.message(), "missing base url");
        assert_eq!(error.to_string(), "missing base url");
    }

    #[test]
    fn image_mime_type_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(image_mime_type(Path::new("a/photo.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("shot.webp")), Some("image/webp"));
        assert_eq!(image_mime_type(Path::new("notes.txt")), None);
        assert_eq!(image_mime_type(Path::new("no_extension")), None);
    }

    #[test]
    fn chat_request_builders_set_model_and_images() {
        let image = ImageAttachment::from_path("cat.png").expect("png should be supported");
        let request = ChatRequest::new(7, "conv-1", "describe")
            .with_model("llava")
            .with_images(vec![image.clone()]);

        assert_eq!(request.request_id, 7);
        assert_eq!(request.conversation_id, "conv-1");
        assert_eq!(request.model.as_deref(), Some("llava"));
        assert_eq!(request.images, vec![image]);
    }

    #[test]
    fn minimal_provider_emits_started_then_finished() {
        let provider = MinimalProvider;
        let mut events = Vec::new();
        provider
            .stream(
                ChatRequest::new(3, "conv", "hi"),
                CancelToken::new(),
                &mut |event| events.push(event),
            )
            .expect("minimal provider should succeed");

        assert_eq!(
            events,
            vec![
                StreamEvent::Started { request_id: 3 },
                StreamEvent::Finished { request_id: 3 },
            ]
        );
        assert_eq!(provider.profile().provider_id, "minimal");
    }
}
