//! Process-backed terminal output and line input.

use std::io::{self, IsTerminal, Stdout, Write};
use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Config, Editor};
use tracing::{debug, warn};

use crate::core::terminal::{LineInput, ReadLine, Terminal};
use crate::platform::completion::{PromptCompleter, PromptHelper};

/// Entries kept in the prompt history file.
pub const HISTORY_SIZE: usize = 2000;

/// Standard output as a [`Terminal`].
pub struct ProcessTerminal {
    stdout: Stdout,
}

impl ProcessTerminal {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for ProcessTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ProcessTerminal {
    fn write(&mut self, data: &str) {
        if data.is_empty() {
            return;
        }
        let _ = self.stdout.lock().write_all(data.as_bytes());
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.lock().flush()
    }

    fn columns(&self) -> u16 {
        read_winsize(libc::STDOUT_FILENO)
            .map(|(cols, _)| cols)
            .unwrap_or(80)
    }
}

#[cfg(unix)]
fn read_winsize(fd: libc::c_int) -> Option<(u16, u16)> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some((size.ws_col, size.ws_row))
    } else {
        None
    }
}

#[cfg(not(unix))]
fn read_winsize(_fd: i32) -> Option<(u16, u16)> {
    None
}

/// True when standard input is attached to a terminal.
pub fn stdin_is_terminal() -> bool {
    io::stdin().is_terminal()
}

/// True when standard output is attached to a terminal.
pub fn stdout_is_terminal() -> bool {
    io::stdout().is_terminal()
}

/// Terminal attributes of stdin captured in cooked mode.
#[cfg(unix)]
pub struct SavedTerminalMode {
    fd: libc::c_int,
    termios: libc::termios,
}

#[cfg(unix)]
impl SavedTerminalMode {
    /// Returns `None` when stdin is not a terminal.
    pub fn capture() -> Option<Self> {
        if !stdin_is_terminal() {
            return None;
        }
        let fd = libc::STDIN_FILENO;
        match get_termios(fd) {
            Ok(termios) => Some(Self { fd, termios }),
            Err(error) => {
                warn!(error = %error, "failed to read terminal mode");
                None
            }
        }
    }

    pub fn restore(&self) -> io::Result<()> {
        set_termios(self.fd, &self.termios)
    }
}

#[cfg(not(unix))]
pub struct SavedTerminalMode;

#[cfg(not(unix))]
impl SavedTerminalMode {
    pub fn capture() -> Option<Self> {
        None
    }

    pub fn restore(&self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
fn get_termios(fd: libc::c_int) -> io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

#[cfg(unix)]
fn set_termios(fd: libc::c_int, termios: &libc::termios) -> io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Interactive line editor with tab completion and a persistent history file.
pub struct EditorInput {
    editor: Editor<PromptHelper, FileHistory>,
    history_path: Option<PathBuf>,
}

impl EditorInput {
    /// Creates the editor and loads `history_path` when it exists.
    pub fn new(history_path: Option<&Path>, completer: PromptCompleter) -> io::Result<Self> {
        let config = Config::builder()
            .max_history_size(HISTORY_SIZE)
            .map_err(readline_io_error)?
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .build();
        let mut editor = Editor::with_config(config).map_err(readline_io_error)?;
        editor.set_helper(Some(PromptHelper::new(completer)));

        if let Some(path) = history_path.filter(|path| path.exists()) {
            if let Err(error) = editor.load_history(path) {
                warn!(path = %path.display(), error = %error, "failed to load prompt history");
            }
        }

        Ok(Self {
            editor,
            history_path: history_path.map(Path::to_path_buf),
        })
    }

    /// Writes the history file; failures are logged and otherwise ignored.
    pub fn save_history(&mut self) {
        let Some(path) = self.history_path.as_deref() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match self.editor.save_history(path) {
            Ok(()) => debug!(path = %path.display(), "prompt history saved"),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "failed to save prompt history")
            }
        }
    }
}

impl LineInput for EditorInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadLine> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadLine::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadLine::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadLine::Eof),
            Err(error) => Err(readline_io_error(error)),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }
}

impl Drop for EditorInput {
    fn drop(&mut self) {
        self.save_history();
    }
}

fn readline_io_error(error: ReadlineError) -> io::Error {
    match error {
        ReadlineError::Io(error) => error,
        other => io::Error::other(other.to_string()),
    }
}
