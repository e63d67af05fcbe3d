//! Adapts a blocking [`ChatProvider::stream`] call into a disposable
//! subscription with `on_next`/`on_error`/`on_complete` callbacks.
//!
//! Invariant: callbacks are delivered under the delivery lock after checking
//! the disposed and terminated flags. [`Subscription::dispose`] flips
//! `disposed` under the same lock, so a callback already running finishes and
//! nothing is delivered once `dispose` returns.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chat_provider::{CancelToken, ChatProvider, ChatRequest, RequestId, StreamEvent};
use tracing::debug;

use crate::lock_unpoisoned;

/// Receives the mapped stream. At most one of `on_error`/`on_complete` runs.
pub trait StreamObserver: Send + Sync + 'static {
    fn on_next(&self, chunk: &str);
    fn on_error(&self, message: &str);
    fn on_complete(&self);
}

#[derive(Debug, Default)]
struct DeliveryState {
    disposed: bool,
    terminated: bool,
}

struct Shared {
    request_id: RequestId,
    delivery: Mutex<DeliveryState>,
    cancel: CancelToken,
    observer: Arc<dyn StreamObserver>,
}

impl Shared {
    /// Runs `callback` under the delivery lock unless disposed or terminated.
    fn deliver(&self, terminal: bool, callback: impl FnOnce(&dyn StreamObserver)) -> bool {
        let mut state = lock_unpoisoned(&self.delivery);
        if state.disposed || state.terminated {
            return false;
        }
        if terminal {
            state.terminated = true;
        }
        callback(self.observer.as_ref());
        true
    }

    fn deliver_event(&self, event: StreamEvent) {
        if event.request_id() != self.request_id {
            debug!(
                expected = self.request_id,
                received = event.request_id(),
                "dropping stream event for another request"
            );
            return;
        }

        match event {
            StreamEvent::Started { request_id } => debug!(request_id, "stream started"),
            StreamEvent::Chunk { text, .. } => {
                self.deliver(false, |observer| observer.on_next(&text));
            }
            StreamEvent::Finished { .. } => {
                self.deliver(true, |observer| observer.on_complete());
            }
            StreamEvent::Failed { error, .. } => {
                self.deliver(true, |observer| observer.on_error(&error));
            }
            StreamEvent::Cancelled { request_id } => {
                // Expected after dispose; otherwise the backend gave up on its own.
                if !self.deliver(true, |observer| {
                    observer.on_error("Response stream was cancelled by the provider")
                }) {
                    debug!(request_id, "stream cancelled");
                }
            }
        }
    }

    fn is_terminated(&self) -> bool {
        lock_unpoisoned(&self.delivery).terminated
    }
}

/// Handle to one live response stream.
pub struct Subscription {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    pub fn request_id(&self) -> RequestId {
        self.shared.request_id
    }

    /// Stops delivery and asks the backend to stop producing.
    ///
    /// Blocks only while a callback already in progress completes. Returns
    /// true for the call that disposed.
    pub fn dispose(&self) -> bool {
        {
            let mut state = lock_unpoisoned(&self.shared.delivery);
            if state.disposed {
                return false;
            }
            state.disposed = true;
        }

        self.shared.cancel.cancel();
        debug!(request_id = self.shared.request_id, "subscription disposed");
        self.reap_worker();
        true
    }

    pub fn is_disposed(&self) -> bool {
        lock_unpoisoned(&self.shared.delivery).disposed
    }

    /// True once a terminal callback was delivered.
    pub fn is_terminated(&self) -> bool {
        self.shared.is_terminated()
    }

    /// Joins the worker if it already exited; a running worker is left to
    /// observe the cancel token and exit on its own.
    fn reap_worker(&self) {
        let mut worker = lock_unpoisoned(&self.worker);
        let finished = worker.as_ref().is_some_and(|handle| {
            handle.is_finished() && handle.thread().id() != thread::current().id()
        });
        if finished {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.reap_worker();
    }
}

/// Opens `request` on a dedicated `sc-stream-{id}` worker thread.
pub fn subscribe(
    provider: Arc<dyn ChatProvider>,
    request: ChatRequest,
    observer: Arc<dyn StreamObserver>,
) -> io::Result<Subscription> {
    let request_id = request.request_id;
    let shared = Arc::new(Shared {
        request_id,
        delivery: Mutex::new(DeliveryState::default()),
        cancel: CancelToken::new(),
        observer,
    });

    let worker_shared = Arc::clone(&shared);
    let worker = thread::Builder::new()
        .name(format!("sc-stream-{request_id}"))
        .spawn(move || run_worker(provider, request, worker_shared))?;

    Ok(Subscription {
        shared,
        worker: Mutex::new(Some(worker)),
    })
}

fn run_worker(provider: Arc<dyn ChatProvider>, request: ChatRequest, shared: Arc<Shared>) {
    let cancel = shared.cancel.clone();
    let mut emit = |event: StreamEvent| shared.deliver_event(event);

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        provider.stream(request, cancel, &mut emit)
    }));

    let fallback = match outcome {
        Ok(Ok(())) => "Chat provider exited without terminal event".to_string(),
        Ok(Err(error)) => error,
        Err(_) => "Chat provider panicked".to_string(),
    };

    // No-op when a terminal callback already ran or the subscription was disposed.
    shared.deliver(true, |observer| observer.on_error(&fallback));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionSignal;
    use chat_provider::ProviderProfile;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        done: CompletionSignal,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().expect("recorder lock").clone()
        }
    }

    impl StreamObserver for Recorder {
        fn on_next(&self, chunk: &str) {
            self.events.lock().expect("recorder lock").push(format!("next:{chunk}"));
        }

        fn on_error(&self, message: &str) {
            self.events.lock().expect("recorder lock").push(format!("error:{message}"));
            self.done.release();
        }

        fn on_complete(&self) {
            self.events.lock().expect("recorder lock").push("complete".to_string());
            self.done.release();
        }
    }

    struct ScriptedProvider {
        script: fn(&ChatRequest, &mut dyn FnMut(StreamEvent)) -> Result<(), String>,
    }

    impl ChatProvider for ScriptedProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                provider_id: "scripted".to_string(),
                model_id: "scripted".to_string(),
            }
        }

        fn stream(
            &self,
            req: ChatRequest,
            _cancel: CancelToken,
            emit: &mut dyn FnMut(StreamEvent),
        ) -> Result<(), String> {
            (self.script)(&req, emit)
        }
    }

    fn run(
        script: fn(&ChatRequest, &mut dyn FnMut(StreamEvent)) -> Result<(), String>,
    ) -> Vec<String> {
        let recorder = Arc::new(Recorder::default());
        let subscription = subscribe(
            Arc::new(ScriptedProvider { script }),
            ChatRequest::new(7, "conversation", "hi"),
            recorder.clone(),
        )
        .expect("worker should spawn");

        recorder.done.wait();
        thread::sleep(Duration::from_millis(20));
        assert!(subscription.is_terminated());
        recorder.events()
    }

    #[test]
    fn events_after_the_terminal_event_are_dropped() {
        let events = run(|req, emit| {
            let request_id = req.request_id;
            emit(StreamEvent::Chunk { request_id, text: "a".to_string() });
            emit(StreamEvent::Finished { request_id });
            emit(StreamEvent::Chunk { request_id, text: "late".to_string() });
            emit(StreamEvent::Failed { request_id, error: "late".to_string() });
            Ok(())
        });

        assert_eq!(events, vec!["next:a", "complete"]);
    }

    #[test]
    fn provider_error_becomes_on_error() {
        let events = run(|_, _| Err("backend unavailable".to_string()));
        assert_eq!(events, vec!["error:backend unavailable"]);
    }

    #[test]
    fn missing_terminal_event_becomes_on_error() {
        let events = run(|req, emit| {
            emit(StreamEvent::Chunk {
                request_id: req.request_id,
                text: "partial".to_string(),
            });
            Ok(())
        });

        assert_eq!(
            events,
            vec!["next:partial", "error:Chat provider exited without terminal event"]
        );
    }

    #[test]
    fn provider_panic_becomes_on_error() {
        let events = run(|_, _| panic!("scripted panic"));
        assert_eq!(events, vec!["error:Chat provider panicked"]);
    }

    #[test]
    fn events_for_other_requests_are_ignored() {
        let events = run(|req, emit| {
            emit(StreamEvent::Chunk {
                request_id: req.request_id + 1,
                text: "foreign".to_string(),
            });
            emit(StreamEvent::Finished {
                request_id: req.request_id,
            });
            Ok(())
        });

        assert_eq!(events, vec!["complete"]);
    }
}
