use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chat_provider_mock::MockProvider;
use sc_cli::completion::CompletionSignal;
use sc_cli::consumer::{StreamOutcome, THINKING_LABEL};
use sc_cli::prompt::ParsedPrompt;

mod support;

use support::{harness, harness_with_spinner, wait_until};

fn prompt(text: &str) -> ParsedPrompt {
    ParsedPrompt {
        text: text.to_string(),
        images: Vec::new(),
    }
}

#[test]
fn immediate_response_prints_exactly_the_text_and_a_newline() {
    let provider = Arc::new(MockProvider::new(vec!["Mock response".to_string()]));
    let harness = harness_with_spinner(provider.clone(), true);

    let completion = Arc::new(CompletionSignal::new());

    let outcome = harness.consumer.consume_with(
        "conversation",
        None,
        prompt("hello"),
        Arc::clone(&completion),
    );

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(harness.terminal.output(), "Mock response\n");
    assert!(!harness.coordinator.is_active());
    assert_eq!(provider.streams_opened(), 1);
    assert!(completion.is_released());
    assert_eq!(completion.release_calls(), 1);
}

#[test]
fn cancelled_response_releases_the_completion_once() {
    let provider = Arc::new(
        MockProvider::new(vec!["tick".to_string(); 50])
            .with_chunk_delay(Duration::from_millis(20)),
    );
    let harness = harness(provider);
    let completion = Arc::new(CompletionSignal::new());

    let consumer = Arc::clone(&harness.consumer);
    let worker = {
        let completion = Arc::clone(&completion);
        thread::spawn(move || {
            consumer.consume_with("conversation", None, prompt("go"), completion)
        })
    };

    let terminal = harness.terminal.clone();
    assert!(wait_until(Duration::from_secs(2), || terminal
        .output()
        .contains("tick")));
    assert!(harness.coordinator.cancel());

    let outcome = worker.join().expect("consumer thread should finish");
    assert_eq!(outcome, StreamOutcome::Cancelled);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(completion.release_calls(), 1);
}

#[test]
fn delayed_response_shows_spinner_then_clears_it() {
    let provider = Arc::new(
        MockProvider::new(vec!["Delayed".to_string()])
            .with_start_delay(Duration::from_millis(200)),
    );
    let harness = harness_with_spinner(provider, true);

    let outcome = harness.consumer.consume("conversation", None, prompt("hello"));
    assert_eq!(outcome, StreamOutcome::Completed);

    let output = harness.terminal.output();
    let clear = format!("\r{}\r", " ".repeat(THINKING_LABEL.len() + 10));
    assert!(
        output.starts_with(&format!("\r⠋ {THINKING_LABEL}")),
        "spinner frame missing: {output:?}"
    );
    assert!(output.ends_with(&format!("{clear}Delayed\n")), "unexpected tail: {output:?}");
    assert_eq!(output.matches(&clear).count(), 1);
}

#[test]
fn backend_error_is_printed_on_a_fresh_line() {
    let provider = Arc::new(MockProvider::new(vec!["partial".to_string()]).with_failure("boom"));
    let harness = harness(provider);

    let outcome = harness.consumer.consume("conversation", None, prompt("hello"));

    assert_eq!(outcome, StreamOutcome::Failed("boom".to_string()));
    assert_eq!(harness.terminal.output(), "partial\nError: boom\n");
    assert!(!harness.coordinator.is_active());
}

#[test]
fn multi_chunk_stream_is_written_in_order() {
    let chunks = ["The ", "quick ", "brown ", "fox"]
        .iter()
        .map(|chunk| chunk.to_string())
        .collect();
    let harness = harness(Arc::new(
        MockProvider::new(chunks).with_chunk_delay(Duration::from_millis(5)),
    ));

    let outcome = harness.consumer.consume("conversation", Some("llava"), prompt("hi"));

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(harness.terminal.output(), "The quick brown fox\n");
}

#[test]
fn consecutive_prompts_reuse_the_same_consumer() {
    let harness = harness(Arc::new(MockProvider::new(vec!["ok".to_string()])));

    for _ in 0..3 {
        assert_eq!(
            harness.consumer.consume("conversation", None, prompt("again")),
            StreamOutcome::Completed
        );
    }
    assert_eq!(harness.terminal.output(), "ok\nok\nok\n");
}
