//! Interactive prompt loop.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sc_term::{LineInput, ReadLine, TerminalCmd};
use tracing::debug;

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use crate::consumer::{StreamConsumer, StreamOutcome};
use crate::prompt::parse_prompt;

pub const PROMPT: &str = "sc> ";
pub const CONTINUATION_PROMPT: &str = "... ";
pub const INTERRUPT_HINT: &str = "Use Ctrl + d or /bye to exit.\n";

const MULTILINE_FENCE: &str = "\"\"\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    /// `/bye` and friends.
    Quit,
    Eof,
    /// A streamed response was interrupted.
    Interrupted,
    /// SIGTERM or SIGHUP.
    Shutdown,
}

enum Message {
    Text(String),
    Interrupted,
    Eof,
}

pub struct Repl<I: LineInput> {
    input: I,
    consumer: StreamConsumer,
    base_dir: PathBuf,
    conversation_id: String,
    model: Option<String>,
    shutdown: Arc<AtomicBool>,
}

impl<I: LineInput> Repl<I> {
    pub fn new(
        input: I,
        consumer: StreamConsumer,
        conversation_id: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input,
            consumer,
            base_dir: base_dir.into(),
            conversation_id: conversation_id.into(),
            model: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Flag that ends the loop before the next prompt.
    #[must_use]
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn run(&mut self) -> io::Result<ReplExit> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(ReplExit::Shutdown);
            }

            let text = match self.read_message()? {
                Message::Text(text) => text,
                Message::Interrupted => {
                    self.write(INTERRUPT_HINT);
                    continue;
                }
                Message::Eof => return Ok(ReplExit::Eof),
            };

            if text.trim().is_empty() {
                continue;
            }
            self.input.add_history(&text);

            if let Some(command) = parse_slash_command(&text) {
                if let Some(exit) = self.handle_command(command) {
                    return Ok(exit);
                }
                continue;
            }

            let prompt = parse_prompt(&text, &self.base_dir);
            if prompt.text.is_empty() && prompt.images.is_empty() {
                continue;
            }

            let outcome = self
                .consumer
                .consume(&self.conversation_id, self.model.as_deref(), prompt);
            if outcome == StreamOutcome::Interrupted {
                if self.shutdown.load(Ordering::SeqCst) {
                    return Ok(ReplExit::Shutdown);
                }
                return Ok(ReplExit::Interrupted);
            }
        }
    }

    fn read_message(&mut self) -> io::Result<Message> {
        let first = match self.input.read_line(PROMPT)? {
            ReadLine::Line(line) => line,
            ReadLine::Interrupted => return Ok(Message::Interrupted),
            ReadLine::Eof => return Ok(Message::Eof),
        };

        let Some(opened) = first.trim_start().strip_prefix(MULTILINE_FENCE) else {
            return Ok(Message::Text(first));
        };
        if let Some(closed) = opened.trim_end().strip_suffix(MULTILINE_FENCE) {
            return Ok(Message::Text(closed.to_string()));
        }

        let mut lines = vec![opened.to_string()];
        loop {
            match self.input.read_line(CONTINUATION_PROMPT)? {
                ReadLine::Line(line) => match line.trim_end().strip_suffix(MULTILINE_FENCE) {
                    Some(last) => {
                        lines.push(last.to_string());
                        return Ok(Message::Text(lines.join("\n")));
                    }
                    None => lines.push(line),
                },
                ReadLine::Interrupted => return Ok(Message::Interrupted),
                ReadLine::Eof => return Ok(Message::Eof),
            }
        }
    }

    fn handle_command(&mut self, command: SlashCommand) -> Option<ReplExit> {
        match command {
            SlashCommand::Quit => {
                self.write("Goodbye!\n");
                return Some(ReplExit::Quit);
            }
            SlashCommand::Help => self.write(HELP_TEXT),
            SlashCommand::Clear => {
                let _ = self.consumer.output().emit(TerminalCmd::ClearScreen);
            }
            SlashCommand::Show => {
                let profile = self.consumer.provider().profile();
                let model = self.model.clone().unwrap_or(profile.model_id);
                self.write(&format!(
                    "Provider: {}\nModel: {model}\nConversation: {}\n",
                    profile.provider_id, self.conversation_id
                ));
            }
            SlashCommand::SetModel(model) => {
                debug!(model = %model, "switching session model");
                self.write(&format!("Set model to '{model}'.\n"));
                self.model = Some(model);
            }
            SlashCommand::Usage(usage) => self.write(&format!("{usage}\n")),
            SlashCommand::Unknown(command) => self.write(&format!(
                "Unknown command: {command}. Type /help for help.\n"
            )),
        }
        None
    }

    fn write(&self, text: &str) {
        let _ = self.consumer.output().write_str(text);
    }
}
