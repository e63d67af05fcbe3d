//! One-shot wait/release gate the REPL blocks on while a response streams.

use std::sync::{Condvar, Mutex};

use crate::lock_unpoisoned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Released,
    /// The waiter was woken by [`CompletionSignal::interrupt`] before release.
    Interrupted,
}

#[derive(Debug, Default)]
struct GateState {
    released: bool,
    interrupted: bool,
    release_calls: usize,
}

#[derive(Debug, Default)]
pub struct CompletionSignal {
    state: Mutex<GateState>,
    wake: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the gate. Returns true only for the call that opened it.
    pub fn release(&self) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        state.release_calls += 1;
        if state.released {
            return false;
        }
        state.released = true;
        self.wake.notify_all();
        true
    }

    /// Wakes the waiter without releasing. Ignored once released.
    pub fn interrupt(&self) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        if state.released || state.interrupted {
            return false;
        }
        state.interrupted = true;
        self.wake.notify_all();
        true
    }

    pub fn is_released(&self) -> bool {
        lock_unpoisoned(&self.state).released
    }

    /// Number of `release` calls so far, including ones that found the gate
    /// already open.
    pub fn release_calls(&self) -> usize {
        lock_unpoisoned(&self.state).release_calls
    }

    /// Blocks until released or interrupted. Release wins when both happened.
    pub fn wait(&self) -> WaitOutcome {
        let mut state = lock_unpoisoned(&self.state);
        loop {
            if state.released {
                return WaitOutcome::Released;
            }
            if state.interrupted {
                return WaitOutcome::Interrupted;
            }
            state = match self.wake.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn release_is_idempotent() {
        let signal = CompletionSignal::new();
        assert!(signal.release());
        assert!(!signal.release());
        assert!(signal.is_released());
        assert_eq!(signal.release_calls(), 2);
        assert_eq!(signal.wait(), WaitOutcome::Released);
    }

    #[test]
    fn release_from_another_thread_wakes_the_waiter() {
        let signal = Arc::new(CompletionSignal::new());
        let releaser = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.release()
            })
        };

        assert_eq!(signal.wait(), WaitOutcome::Released);
        assert!(releaser.join().expect("releaser thread should finish"));
    }

    #[test]
    fn interrupt_wakes_the_waiter_without_releasing() {
        let signal = Arc::new(CompletionSignal::new());
        let interrupter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.interrupt()
            })
        };

        assert_eq!(signal.wait(), WaitOutcome::Interrupted);
        assert!(interrupter.join().expect("interrupter thread should finish"));
        assert!(!signal.is_released());
    }

    #[test]
    fn interrupt_after_release_is_ignored() {
        let signal = CompletionSignal::new();
        signal.release();
        assert!(!signal.interrupt());
        assert_eq!(signal.wait(), WaitOutcome::Released);
    }
}
