//! Deterministic mock implementation of the shared `chat_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chat_provider::{CancelToken, ChatProvider, ChatRequest, ProviderProfile, StreamEvent};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const DEFAULT_MODEL_ID: &str = "mock";

/// Scripted provider used by `sc_cli` tests and `sc --provider mock`.
#[derive(Debug)]
pub struct MockProvider {
    chunks: Vec<String>,
    start_delay: Duration,
    chunk_delay: Duration,
    failure: Option<String>,
    model_id: String,
    streams_opened: AtomicUsize,
}

impl MockProvider {
    /// Creates a mock provider that emits `chunks` with no delays.
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            start_delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            failure: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            streams_opened: AtomicUsize::new(0),
        }
    }

    /// Delay before the first chunk.
    #[must_use]
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Delay after every chunk.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Fails with `error` after all chunks were emitted.
    #[must_use]
    pub fn with_failure(mut self, error: impl Into<String>) -> Self {
        self.failure = Some(error.into());
        self
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let trimmed = model_id.trim();
        if !trimmed.is_empty() {
            self.model_id = trimmed.to_string();
        }
        self
    }

    /// Number of streams opened against this provider.
    #[must_use]
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    /// Sleeps `delay` in short slices so cancellation is observed promptly.
    fn sleep_unless_cancelled(delay: Duration, cancel: &CancelToken) {
        let slice = Duration::from_millis(5);
        let mut remaining = delay;
        while !remaining.is_zero() && !cancel.is_cancelled() {
            let step = remaining.min(slice);
            thread::sleep(step);
            remaining -= step;
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            "This ".to_string(),
            "is ".to_string(),
            "a ".to_string(),
            "mocked ".to_string(),
            "streaming ".to_string(),
            "response.".to_string(),
        ])
        .with_start_delay(Duration::from_millis(300))
        .with_chunk_delay(Duration::from_millis(60))
    }
}

impl ChatProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
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
        self.streams_opened.fetch_add(1, Ordering::SeqCst);

        emit(StreamEvent::Started { request_id });
        Self::sleep_unless_cancelled(self.start_delay, &cancel);

        for chunk in &self.chunks {
            if cancel.is_cancelled() {
                emit(StreamEvent::Cancelled { request_id });
                return Ok(());
            }

            emit(StreamEvent::Chunk {
                request_id,
                text: chunk.clone(),
            });
            Self::sleep_unless_cancelled(self.chunk_delay, &cancel);
        }

        if cancel.is_cancelled() {
            emit(StreamEvent::Cancelled { request_id });
        } else if let Some(error) = &self.failure {
            emit(StreamEvent::Failed {
                request_id,
                error: error.clone(),
            });
        } else {
            emit(StreamEvent::Finished { request_id });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_events(provider: &MockProvider, cancel: CancelToken) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        provider
            .stream(
                ChatRequest::new(7, "conv", "test"),
                cancel,
                &mut |event| events.push(event),
            )
            .expect("mock stream should succeed");
        events
    }

    #[test]
    fn profile_exposes_explicit_mock_provider_identity() {
        let profile = MockProvider::new(Vec::new()).profile();

        assert_eq!(profile.provider_id, MOCK_PROVIDER_ID);
        assert_eq!(profile.model_id, "mock");
    }

    #[test]
    fn blank_model_override_keeps_default() {
        let profile = MockProvider::new(Vec::new()).with_model_id("  ").profile();
        assert_eq!(profile.model_id, "mock");
    }

    #[test]
    fn stream_emits_started_chunks_and_finished() {
        let provider = MockProvider::new(vec!["one ".to_string(), "two".to_string()]);

        let events = collect_events(&provider, CancelToken::new());

        assert_eq!(
            events,
            vec![
                StreamEvent::Started { request_id: 7 },
                StreamEvent::Chunk {
                    request_id: 7,
                    text: "one ".to_string(),
                },
                StreamEvent::Chunk {
                    request_id: 7,
                    text: "two".to_string(),
                },
                StreamEvent::Finished { request_id: 7 },
            ]
        );
        assert_eq!(provider.streams_opened(), 1);
    }

    #[test]
    fn stream_emits_cancelled_when_cancel_is_set() {
        let provider = MockProvider::new(vec!["ignored".to_string()]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let events = collect_events(&provider, cancel);

        assert!(matches!(
            events.first(),
            Some(StreamEvent::Started { request_id: 7 })
        ));
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Cancelled { request_id: 7 })
        ));
        assert!(!events
            .iter()
            .any(|event| matches!(event, StreamEvent::Chunk { .. })));
    }

    #[test]
    fn failure_is_emitted_after_chunks() {
        let provider = MockProvider::new(vec!["partial".to_string()]).with_failure("model offline");

        let events = collect_events(&provider, CancelToken::new());

        assert_eq!(
            events.last(),
            Some(&StreamEvent::Failed {
                request_id: 7,
                error: "model offline".to_string(),
            })
        );
    }
}
