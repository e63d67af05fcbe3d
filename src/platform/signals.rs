//! Bridges OS signals to in-process callbacks on a dedicated thread.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::{debug, warn};

use crate::platform::process_terminal::SavedTerminalMode;

/// Keeps the signal thread alive. Dropping it unregisters delivery and joins
/// the thread.
pub struct SignalHookGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalHookGuard {
    /// Delivers `signal` to this process, for tests and self-shutdown.
    pub fn raise(signal: i32) -> io::Result<()> {
        signal_hook::low_level::raise(signal)
    }
}

impl Drop for SignalHookGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Installs the interrupt/terminate bridge.
///
/// Every SIGINT calls `on_interrupt` (cancel the current stream and keep
/// running); SIGTERM and SIGHUP call `on_terminate`. Both receive the signal
/// number and run on the signal thread, never inside the raw handler.
///
/// Registering replaces the default dispositions, so a callback that decides
/// the process should end calls [`terminate_with_default`].
pub fn install_signal_handlers<I, T>(on_interrupt: I, on_terminate: T) -> io::Result<SignalHookGuard>
where
    I: Fn(i32) + Send + Sync + 'static,
    T: Fn(i32) + Send + Sync + 'static,
{
    let on_interrupt = Arc::new(on_interrupt);
    let on_terminate = Arc::new(on_terminate);
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    let handle = signals.handle();

    let thread = thread::Builder::new()
        .name("sc-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGINT => {
                        debug!("SIGINT received");
                        on_interrupt(SIGINT);
                    }
                    other => {
                        debug!(signal = other, "termination signal received");
                        on_terminate(other);
                    }
                }
            }
        })?;

    Ok(SignalHookGuard {
        handle,
        thread: Some(thread),
    })
}

/// Ends the process the way `signal` would have without the bridge.
///
/// The saved terminal mode is put back first so a line editor killed mid-read
/// does not leave the tty in raw mode. Only returns if the signal's default
/// action is to ignore it, or if emulation failed.
pub fn terminate_with_default(signal: i32, mode: Option<&SavedTerminalMode>) -> io::Result<()> {
    if let Some(mode) = mode {
        if let Err(error) = mode.restore() {
            warn!(error = %error, "failed to restore terminal mode before exit");
        }
    }
    debug!(signal, "terminating with default signal action");
    signal_hook::low_level::emulate_default_handler(signal)
}
