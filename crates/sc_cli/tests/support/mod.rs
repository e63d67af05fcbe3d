#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chat_provider::{ChatProvider, ChatRequest};
use sc_cli::consumer::StreamConsumer;
use sc_cli::coordinator::SessionCoordinator;
use sc_term::{LineInput, OutputHandle, ReadLine, Terminal};

#[derive(Default)]
pub struct TerminalTrace {
    pub writes: Vec<String>,
    pub flushes: usize,
}

/// Terminal that records every write for assertions.
#[derive(Clone, Default)]
pub struct RecordingTerminal {
    state: Arc<Mutex<TerminalTrace>>,
}

impl RecordingTerminal {
    pub fn output(&self) -> String {
        lock_unpoisoned(&self.state).writes.join("")
    }

    pub fn flushes(&self) -> usize {
        lock_unpoisoned(&self.state).flushes
    }
}

impl Terminal for RecordingTerminal {
    fn write(&mut self, data: &str) {
        lock_unpoisoned(&self.state).writes.push(data.to_string());
    }

    fn flush(&mut self) -> io::Result<()> {
        lock_unpoisoned(&self.state).flushes += 1;
        Ok(())
    }

    fn columns(&self) -> u16 {
        80
    }
}

/// Line input that replays a script, then reports end of input.
pub struct ScriptedInput {
    lines: VecDeque<ReadLine>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub history: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInput {
    pub fn new(lines: impl IntoIterator<Item = ReadLine>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
            prompts: Arc::new(Mutex::new(Vec::new())),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl LineInput for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine> {
        lock_unpoisoned(&self.prompts).push(prompt.to_string());
        Ok(self.lines.pop_front().unwrap_or(ReadLine::Eof))
    }

    fn add_history(&mut self, line: &str) {
        lock_unpoisoned(&self.history).push(line.to_string());
    }
}

pub fn line(text: &str) -> ReadLine {
    ReadLine::Line(text.to_string())
}

pub struct Harness {
    pub terminal: RecordingTerminal,
    pub coordinator: Arc<SessionCoordinator>,
    pub consumer: Arc<StreamConsumer>,
}

pub fn harness(provider: Arc<dyn ChatProvider>) -> Harness {
    harness_with_spinner(provider, false)
}

pub fn harness_with_spinner(provider: Arc<dyn ChatProvider>, spinner: bool) -> Harness {
    let terminal = RecordingTerminal::default();
    let coordinator = Arc::new(SessionCoordinator::new());
    let consumer = Arc::new(
        StreamConsumer::new(
            provider,
            Arc::clone(&coordinator),
            OutputHandle::new(terminal.clone()),
        )
        .with_spinner(spinner),
    );
    Harness {
        terminal,
        coordinator,
        consumer,
    }
}

pub fn request(text: &str) -> ChatRequest {
    ChatRequest::new(1, "conversation", text)
}

pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
