//! Typed terminal output commands and the shared output handle.
//!
//! Invariant: every write+flush sequence happens under one acquisition of the
//! output lock, so spinner frames, streamed chunks, and clears never interleave.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::terminal::Terminal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd {
    /// Text or control sequences written verbatim.
    Bytes(String),
    BytesStatic(&'static str),

    /// `"\r" + spaces(width) + "\r"`: blanks the current line in place.
    ClearLine { width: usize },

    /// Clears the screen and homes the cursor.
    ClearScreen,
}

impl TerminalCmd {
    pub fn bytes(data: impl Into<String>) -> Self {
        Self::Bytes(data.into())
    }

    fn apply(self, term: &mut dyn Terminal) {
        match self {
            Self::Bytes(data) => term.write(&data),
            Self::BytesStatic(data) => term.write(data),
            Self::ClearLine { width } => term.write(&format!("\r{}\r", " ".repeat(width))),
            Self::ClearScreen => term.write("\x1b[2J\x1b[H"),
        }
    }
}

/// Cloneable handle to the process terminal.
#[derive(Clone)]
pub struct OutputHandle {
    terminal: Arc<Mutex<Box<dyn Terminal>>>,
}

impl OutputHandle {
    pub fn new(terminal: impl Terminal + 'static) -> Self {
        Self {
            terminal: Arc::new(Mutex::new(Box::new(terminal))),
        }
    }

    /// Acquires the output lock. Commands pushed on the returned gate are
    /// written and flushed by [`OutputGate::flush`] before the lock is released.
    pub fn lock(&self) -> OutputGate<'_> {
        OutputGate {
            terminal: lock_unpoisoned(&self.terminal),
            cmds: Vec::new(),
        }
    }

    /// Writes one command and flushes under a single lock acquisition.
    pub fn emit(&self, cmd: TerminalCmd) -> io::Result<()> {
        let mut gate = self.lock();
        gate.push(cmd);
        gate.flush()
    }

    pub fn write_str(&self, data: &str) -> io::Result<()> {
        self.emit(TerminalCmd::bytes(data))
    }
}

/// Exclusive access to the terminal for one batch of commands.
pub struct OutputGate<'a> {
    terminal: MutexGuard<'a, Box<dyn Terminal>>,
    cmds: Vec<TerminalCmd>,
}

impl OutputGate<'_> {
    pub fn push(&mut self, cmd: TerminalCmd) {
        self.cmds.push(cmd);
    }

    /// Width of the locked terminal, for commands that must fit one line.
    pub fn columns(&self) -> u16 {
        self.terminal.columns()
    }

    /// Writes buffered commands in order, then flushes. The lock is released
    /// when the gate drops.
    pub fn flush(mut self) -> io::Result<()> {
        for cmd in self.cmds.drain(..) {
            cmd.apply(self.terminal.as_mut());
        }
        self.terminal.flush()
    }
}

pub(crate) fn lock_unpoisoned<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
