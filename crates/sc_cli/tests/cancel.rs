use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chat_provider::{CancelToken, ChatProvider, ChatRequest, ProviderProfile, StreamEvent};
use chat_provider_mock::MockProvider;
use sc_cli::consumer::{StreamConsumer, StreamOutcome};
use sc_cli::coordinator::SessionCoordinator;
use sc_cli::prompt::ParsedPrompt;
use sc_term::{OutputHandle, Terminal};

mod support;

use support::{harness, lock_unpoisoned, wait_until};

fn prompt(text: &str) -> ParsedPrompt {
    ParsedPrompt {
        text: text.to_string(),
        images: Vec::new(),
    }
}

fn numbered_chunks(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("chunk{index}")).collect()
}

#[test]
fn cancel_mid_stream_stops_output_and_returns_to_idle() {
    let provider = Arc::new(
        MockProvider::new(numbered_chunks(5)).with_chunk_delay(Duration::from_millis(100)),
    );
    let harness = harness(provider.clone());

    let consumer = Arc::clone(&harness.consumer);
    let worker = thread::spawn(move || consumer.consume("conversation", None, prompt("count")));

    let terminal = harness.terminal.clone();
    assert!(wait_until(Duration::from_secs(2), || terminal
        .output()
        .contains("chunk1")));
    assert!(harness.coordinator.cancel());

    let outcome = worker.join().expect("consumer thread should finish");
    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert!(!harness.coordinator.is_active());

    thread::sleep(Duration::from_millis(350));
    let output = harness.terminal.output();
    assert!(output.starts_with("chunk0chunk1"), "unexpected output: {output:?}");
    assert!(!output.contains("chunk4"), "chunk after cancel leaked: {output:?}");
    assert!(output.ends_with('\n'));
    assert!(!output.contains("Error"));

    assert!(!harness.coordinator.cancel());
    assert_eq!(provider.streams_opened(), 1);
}

#[test]
fn repeated_cancel_after_completion_is_a_no_op() {
    let harness = harness(Arc::new(MockProvider::new(vec!["done".to_string()])));

    let outcome = harness.consumer.consume("conversation", None, prompt("hi"));
    assert_eq!(outcome, StreamOutcome::Completed);

    assert!(!harness.coordinator.cancel());
    assert!(!harness.coordinator.cancel());
    assert_eq!(harness.terminal.output(), "done\n");
}

/// Terminal whose write of `"slow"` takes long enough to be interrupted.
#[derive(Clone, Default)]
struct SlowTerminal {
    written: Arc<Mutex<String>>,
    slow_write_started: Arc<AtomicBool>,
}

impl Terminal for SlowTerminal {
    fn write(&mut self, data: &str) {
        if data == "slow" {
            self.slow_write_started.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(150));
        }
        lock_unpoisoned(&self.written).push_str(data);
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn columns(&self) -> u16 {
        80
    }
}

/// Emits two chunks, then one more once cancellation is requested.
struct LateChunkProvider;

impl ChatProvider for LateChunkProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "late-chunk".to_string(),
            model_id: "late-chunk".to_string(),
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
        emit(StreamEvent::Chunk {
            request_id,
            text: "fast".to_string(),
        });
        emit(StreamEvent::Chunk {
            request_id,
            text: "slow".to_string(),
        });

        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(2));
        }
        emit(StreamEvent::Chunk {
            request_id,
            text: "late".to_string(),
        });
        emit(StreamEvent::Cancelled { request_id });
        Ok(())
    }
}

#[test]
fn in_flight_chunk_completes_and_later_chunks_are_suppressed() {
    let terminal = SlowTerminal::default();
    let coordinator = Arc::new(SessionCoordinator::new());
    let consumer = Arc::new(
        StreamConsumer::new(
            Arc::new(LateChunkProvider),
            Arc::clone(&coordinator),
            OutputHandle::new(terminal.clone()),
        )
        .with_spinner(false),
    );

    let worker = {
        let consumer = Arc::clone(&consumer);
        thread::spawn(move || consumer.consume("conversation", None, prompt("go")))
    };

    let started = Arc::clone(&terminal.slow_write_started);
    assert!(wait_until(Duration::from_secs(2), || started
        .load(Ordering::SeqCst)));
    assert!(coordinator.cancel());

    let outcome = worker.join().expect("consumer thread should finish");
    assert_eq!(outcome, StreamOutcome::Cancelled);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(lock_unpoisoned(&terminal.written).as_str(), "fastslow\n");
}
