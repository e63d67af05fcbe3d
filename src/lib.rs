//! Terminal plumbing for the `sc` streaming chat CLI.
//!
//! Invariant: single output gate. Every write reaches the terminal through
//! [`OutputHandle`], which serialises writers so spinner frames and streamed
//! text never interleave mid-sequence.
//!
//! # Public API Overview
//! - [`Terminal`] / [`LineInput`] abstract stdout and the prompt editor;
//!   [`ProcessTerminal`] and [`EditorInput`] are the process-backed versions,
//!   with [`PromptCompleter`] supplying tab completion.
//! - [`Spinner`] draws the "Thinking..." indicator on a [`ScheduledTask`].
//! - [`install_signal_handlers`] bridges SIGINT/SIGTERM/SIGHUP to callbacks;
//!   [`terminate_with_default`] ends the process when nothing handles them.
//! - [`EnvConfig`] and [`logging::init`] carry the environment settings.

pub mod config;
pub mod logging;

pub mod core;
pub mod platform;
pub mod runtime;
pub mod widgets;

pub use crate::config::EnvConfig;

/// Terminal interfaces and the shared output handle.
pub use crate::core::output::{OutputGate, OutputHandle, TerminalCmd};
pub use crate::core::terminal::{LineInput, ReadLine, Terminal};

/// Process-backed terminal and input.
pub use crate::platform::{
    install_signal_handlers, stdin_is_terminal, stdout_is_terminal, terminate_with_default,
    EditorInput, ProcessTerminal, PromptCompleter, PromptHelper, SavedTerminalMode,
    SignalHookGuard, HISTORY_SIZE,
};

/// Timer and spinner.
pub use crate::runtime::timer::ScheduledTask;
pub use crate::widgets::spinner::{Spinner, FRAME_INTERVAL, SPINNER_FRAMES, START_DELAY};
