//! Platform-specific terminal integrations.

pub mod completion;
pub mod process_terminal;
pub mod signals;

pub use completion::{PromptCompleter, PromptHelper};
pub use process_terminal::{
    stdin_is_terminal, stdout_is_terminal, EditorInput, ProcessTerminal, SavedTerminalMode,
    HISTORY_SIZE,
};
pub use signals::{install_signal_handlers, terminate_with_default, SignalHookGuard};
