//! Terminal traits shared by the REPL, the spinner, and the stream consumer.

use std::io;

/// Minimal output terminal.
///
/// Implementations must not buffer beyond `flush`; callers that need several
/// writes to appear atomically hold the [`crate::OutputHandle`] lock.
pub trait Terminal: Send {
    /// Write text to the terminal.
    fn write(&mut self, data: &str);

    /// Flush pending output.
    fn flush(&mut self) -> io::Result<()>;

    /// Terminal width in columns.
    fn columns(&self) -> u16;
}

/// Outcome of one prompt read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or end of input.
    Eof,
}

/// Line-oriented input with history.
pub trait LineInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine>;

    fn add_history(&mut self, line: &str);
}
