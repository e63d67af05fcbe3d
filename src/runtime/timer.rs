//! Cancellable periodic task on a dedicated thread.
//!
//! The task thread sleeps on a condvar so `cancel()` wakes it immediately
//! instead of waiting out the remaining delay.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::output::lock_unpoisoned;

#[derive(Default)]
struct TimerState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl TimerState {
    /// Sleeps until `deadline` or cancellation. Returns true when cancelled.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut cancelled = lock_unpoisoned(&self.cancelled);
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            cancelled = match self.wake.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn is_cancelled(&self) -> bool {
        *lock_unpoisoned(&self.cancelled)
    }

    fn cancel(&self) -> bool {
        let mut cancelled = lock_unpoisoned(&self.cancelled);
        let first = !*cancelled;
        *cancelled = true;
        self.wake.notify_all();
        first
    }
}

/// Handle to a task that runs `tick` after `delay`, then every `period`.
///
/// The task ends when `tick` returns `false` or the handle is cancelled.
pub struct ScheduledTask {
    state: Arc<TimerState>,
    thread: Option<JoinHandle<()>>,
    finished: Option<mpsc::Receiver<()>>,
}

impl ScheduledTask {
    pub fn spawn<F>(
        name: impl Into<String>,
        delay: Duration,
        period: Duration,
        mut tick: F,
    ) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let state = Arc::new(TimerState::default());
        let (finished_tx, finished_rx) = mpsc::channel();
        let thread_state = Arc::clone(&state);

        let thread = thread::Builder::new().name(name.into()).spawn(move || {
            let mut deadline = Instant::now() + delay;
            while !thread_state.wait_until(deadline) {
                if !tick() {
                    break;
                }
                deadline += period;
                let now = Instant::now();
                if deadline < now {
                    deadline = now;
                }
            }
            let _ = finished_tx.send(());
        })?;

        Ok(Self {
            state,
            thread: Some(thread),
            finished: Some(finished_rx),
        })
    }

    /// Stops future ticks. Returns true for the call that cancelled.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Cancels and joins the thread, waiting at most `grace` for a tick that
    /// is already running. Returns false when the thread had to be detached.
    pub fn shutdown(mut self, grace: Duration) -> bool {
        self.cancel();
        self.join_within(grace)
    }

    fn join_within(&mut self, grace: Duration) -> bool {
        let Some(thread) = self.thread.take() else {
            return true;
        };
        let finished = self
            .finished
            .take()
            .map(|receiver| receiver.recv_timeout(grace));

        match finished {
            Some(Ok(())) | Some(Err(mpsc::RecvTimeoutError::Disconnected)) => {
                let _ = thread.join();
                true
            }
            _ => {
                debug!(
                    thread = thread.thread().name().unwrap_or("scheduled-task"),
                    "detaching scheduled task after grace period"
                );
                false
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
        self.join_within(Duration::ZERO);
    }
}
