//! Streams one prompt to the terminal and blocks until it ends.
//!
//! Flow: `Idle -> Requesting -> Streaming -> {Completed|Failed|Cancelled} -> Idle`.
//! The session is registered with the [`SessionCoordinator`] before the
//! calling thread blocks, so an interrupt from the signal thread can always
//! find and tear it down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chat_provider::{ChatProvider, ChatRequest, RequestId};
use sc_term::{OutputHandle, Spinner, TerminalCmd};
use tracing::{debug, error};

use crate::completion::{CompletionSignal, WaitOutcome};
use crate::coordinator::SessionCoordinator;
use crate::lock_unpoisoned;
use crate::prompt::ParsedPrompt;
use crate::subscription::{subscribe, StreamObserver};

pub const THINKING_LABEL: &str = "Thinking...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
    Cancelled,
    /// The blocked caller was interrupted; the REPL should exit.
    Interrupted,
}

/// Writes callbacks to the terminal and releases the completion signal.
struct TerminalObserver {
    output: OutputHandle,
    indicator: Arc<Spinner>,
    completion: Arc<CompletionSignal>,
    line_dirty: AtomicBool,
    completed: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl TerminalObserver {
    fn new(output: OutputHandle, indicator: Arc<Spinner>, completion: Arc<CompletionSignal>) -> Self {
        Self {
            output,
            indicator,
            completion,
            line_dirty: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    /// Ends a partially written line so the prompt starts on a clean one.
    fn finish_partial_line(&self) {
        if self.line_dirty.swap(false, Ordering::SeqCst) {
            let _ = self.output.emit(TerminalCmd::BytesStatic("\n"));
        }
    }
}

impl StreamObserver for TerminalObserver {
    fn on_next(&self, chunk: &str) {
        self.indicator.stop();
        if chunk.is_empty() {
            return;
        }

        let mut gate = self.output.lock();
        gate.push(TerminalCmd::bytes(chunk));
        let _ = gate.flush();
        self.line_dirty.store(!chunk.ends_with('\n'), Ordering::SeqCst);
    }

    fn on_error(&self, message: &str) {
        self.indicator.stop();
        error!(error = message, "response stream failed");

        let mut gate = self.output.lock();
        if self.line_dirty.swap(false, Ordering::SeqCst) {
            gate.push(TerminalCmd::BytesStatic("\n"));
        }
        gate.push(TerminalCmd::bytes(format!("Error: {message}\n")));
        let _ = gate.flush();

        *lock_unpoisoned(&self.failure) = Some(message.to_string());
        self.completion.release();
    }

    fn on_complete(&self) {
        self.indicator.stop();
        let _ = self.output.emit(TerminalCmd::BytesStatic("\n"));
        self.line_dirty.store(false, Ordering::SeqCst);
        self.completed.store(true, Ordering::SeqCst);
        self.completion.release();
    }
}

pub struct StreamConsumer {
    provider: Arc<dyn ChatProvider>,
    coordinator: Arc<SessionCoordinator>,
    output: OutputHandle,
    spinner_enabled: bool,
    next_request_id: AtomicU64,
}

impl StreamConsumer {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        coordinator: Arc<SessionCoordinator>,
        output: OutputHandle,
    ) -> Self {
        Self {
            provider,
            coordinator,
            output,
            spinner_enabled: true,
            next_request_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.spinner_enabled = enabled;
        self
    }

    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    pub fn output(&self) -> &OutputHandle {
        &self.output
    }

    /// Streams `prompt` and blocks until it completes, fails, is cancelled,
    /// or the wait is interrupted.
    pub fn consume(
        &self,
        conversation_id: &str,
        model: Option<&str>,
        prompt: ParsedPrompt,
    ) -> StreamOutcome {
        self.consume_with(
            conversation_id,
            model,
            prompt,
            Arc::new(CompletionSignal::new()),
        )
    }

    /// [`StreamConsumer::consume`] with a caller-owned completion signal,
    /// which must not have been released yet.
    pub fn consume_with(
        &self,
        conversation_id: &str,
        model: Option<&str>,
        prompt: ParsedPrompt,
        completion: Arc<CompletionSignal>,
    ) -> StreamOutcome {
        let request = self.build_request(conversation_id, model, prompt);
        let request_id = request.request_id;
        debug!(
            request_id,
            conversation_id,
            model = request.model.as_deref().unwrap_or("<default>"),
            images = request.images.len(),
            "sending prompt"
        );

        let indicator = Arc::new(
            Spinner::new(self.output.clone(), THINKING_LABEL).with_enabled(self.spinner_enabled),
        );
        indicator.start();

        let observer = Arc::new(TerminalObserver::new(
            self.output.clone(),
            Arc::clone(&indicator),
            Arc::clone(&completion),
        ));

        let subscription = match subscribe(Arc::clone(&self.provider), request, observer.clone()) {
            Ok(subscription) => Arc::new(subscription),
            Err(spawn_error) => {
                indicator.stop();
                let message = format!("failed to start response stream: {spawn_error}");
                error!(request_id, error = %spawn_error, "failed to start response stream");
                let _ = self
                    .output
                    .emit(TerminalCmd::bytes(format!("Error: {message}\n")));
                return StreamOutcome::Failed(message);
            }
        };

        self.coordinator.register(
            Arc::clone(&subscription),
            Arc::clone(&completion),
            Arc::clone(&indicator),
        );

        let waited = completion.wait();
        if waited == WaitOutcome::Interrupted {
            indicator.stop();
            subscription.dispose();
        }
        self.coordinator.clear();

        let outcome = if waited == WaitOutcome::Interrupted {
            StreamOutcome::Interrupted
        } else if let Some(message) = lock_unpoisoned(&observer.failure).take() {
            StreamOutcome::Failed(message)
        } else if observer.completed.load(Ordering::SeqCst) {
            StreamOutcome::Completed
        } else {
            StreamOutcome::Cancelled
        };

        if matches!(outcome, StreamOutcome::Cancelled | StreamOutcome::Interrupted) {
            observer.finish_partial_line();
        }
        debug!(request_id, outcome = ?outcome, "prompt finished");
        outcome
    }

    fn build_request(
        &self,
        conversation_id: &str,
        model: Option<&str>,
        prompt: ParsedPrompt,
    ) -> ChatRequest {
        let request_id: RequestId = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let mut request =
            ChatRequest::new(request_id, conversation_id, prompt.text).with_images(prompt.images);
        if let Some(model) = model.map(str::trim).filter(|model| !model.is_empty()) {
            request = request.with_model(model);
        }
        request
    }
}
