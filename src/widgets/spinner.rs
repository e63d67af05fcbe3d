//! Single-line progress spinner drawn in place on the output terminal.
//!
//! The spinner stays invisible for [`START_DELAY`] so fast responses never
//! flash it, then redraws `"\r{frame} {label}"` every [`FRAME_INTERVAL`].
//! Frames are drawn under the output lock after re-checking the stopped flag,
//! so once [`Spinner::stop`] has cleared the line nothing is drawn again.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::output::{lock_unpoisoned, OutputHandle, TerminalCmd};
use crate::runtime::timer::ScheduledTask;

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Grace period before the first frame.
pub const START_DELAY: Duration = Duration::from_millis(100);

/// Time between frames once running.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(80);

/// Upper bound `stop` waits for an in-flight tick before detaching it.
pub const STOP_GRACE: Duration = Duration::from_millis(100);

/// Extra columns blanked past the label, covering the frame and spacing.
const CLEAR_PADDING: usize = 10;

#[derive(Default)]
struct SpinnerState {
    started: AtomicBool,
    stopped: AtomicBool,
    running: AtomicBool,
    drawn: AtomicBool,
    frame: AtomicUsize,
}

pub struct Spinner {
    label: String,
    output: OutputHandle,
    enabled: bool,
    state: Arc<SpinnerState>,
    task: Mutex<Option<ScheduledTask>>,
}

impl Spinner {
    pub fn new(output: OutputHandle, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            output,
            enabled: true,
            state: Arc::new(SpinnerState::default()),
            task: Mutex::new(None),
        }
    }

    /// A disabled spinner accepts `start`/`stop` but never draws.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// True between the first frame and `stop`.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst) && !self.state.stopped.load(Ordering::SeqCst)
    }

    pub fn has_drawn(&self) -> bool {
        self.state.drawn.load(Ordering::SeqCst)
    }

    /// Schedules the spinner. Idempotent, and a no-op after `stop`.
    pub fn start(&self) {
        if !self.enabled
            || self.state.stopped.load(Ordering::SeqCst)
            || self.state.started.swap(true, Ordering::SeqCst)
        {
            return;
        }

        let state = Arc::clone(&self.state);
        let output = self.output.clone();
        let label = self.label.clone();
        let spawned = ScheduledTask::spawn("sc-spinner", START_DELAY, FRAME_INTERVAL, move || {
            draw_frame(&state, &output, &label)
        });

        match spawned {
            Ok(task) => {
                *lock_unpoisoned(&self.task) = Some(task);
                // A concurrent stop may have missed the task we just stored.
                if self.state.stopped.load(Ordering::SeqCst) {
                    self.release_task();
                }
            }
            Err(error) => warn!(error = %error, "spinner timer failed to start"),
        }
    }

    /// Stops the spinner and clears its line if a frame was drawn.
    ///
    /// Idempotent and callable from any thread, including before the start
    /// delay elapsed, in which case nothing is written.
    pub fn stop(&self) {
        if self.state.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(task) = lock_unpoisoned(&self.task).as_ref() {
            task.cancel();
        }

        let mut gate = self.output.lock();
        if self.state.drawn.load(Ordering::SeqCst) {
            let width = clear_width(&self.label, gate.columns());
            gate.push(TerminalCmd::ClearLine { width });
            let _ = gate.flush();
        } else {
            drop(gate);
        }

        self.release_task();
    }

    fn release_task(&self) {
        let task = lock_unpoisoned(&self.task).take();
        if let Some(task) = task {
            task.shutdown(STOP_GRACE);
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn draw_frame(state: &SpinnerState, output: &OutputHandle, label: &str) -> bool {
    let mut gate = output.lock();
    if state.stopped.load(Ordering::SeqCst) {
        return false;
    }

    let index = state.frame.fetch_add(1, Ordering::SeqCst) % SPINNER_FRAMES.len();
    let label = fit_label(label, gate.columns());
    gate.push(TerminalCmd::bytes(format!("\r{} {label}", SPINNER_FRAMES[index])));
    state.running.store(true, Ordering::SeqCst);
    state.drawn.store(true, Ordering::SeqCst);
    let _ = gate.flush();
    true
}

/// Frame, space and label stay short of the last column so the terminal
/// never wraps the line.
fn fit_label(label: &str, columns: u16) -> &str {
    let budget = usize::from(columns).saturating_sub(3);
    let mut used = 0;
    for (idx, ch) in label.char_indices() {
        used += ch.width().unwrap_or(0);
        if used > budget {
            return &label[..idx];
        }
    }
    label
}

fn clear_width(label: &str, columns: u16) -> usize {
    (label.width() + CLEAR_PADDING).min(usize::from(columns).saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::terminal::Terminal;
    use std::io;
    use std::thread;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Capture {
        written: Arc<Mutex<String>>,
        columns: Option<u16>,
    }

    impl Capture {
        fn text(&self) -> String {
            self.written.lock().expect("capture lock").clone()
        }
    }

    impl Terminal for Capture {
        fn write(&mut self, data: &str) {
            self.written.lock().expect("capture lock").push_str(data);
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn columns(&self) -> u16 {
            self.columns.unwrap_or(80)
        }
    }

    fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn stop_before_start_delay_draws_nothing() {
        let capture = Capture::default();
        let spinner = Spinner::new(OutputHandle::new(capture.clone()), "Thinking...");

        spinner.start();
        thread::sleep(Duration::from_millis(20));
        spinner.stop();
        thread::sleep(START_DELAY + FRAME_INTERVAL);

        assert!(!spinner.has_drawn());
        assert!(!spinner.is_running());
        assert_eq!(capture.text(), "");
    }

    #[test]
    fn running_spinner_draws_frames_then_clears_its_line() {
        let capture = Capture::default();
        let spinner = Spinner::new(OutputHandle::new(capture.clone()), "Thinking...");

        spinner.start();
        assert!(wait_until(Duration::from_secs(2), || spinner.is_running()));
        assert!(capture.text().starts_with("\r⠋ Thinking..."));

        spinner.stop();
        let after_stop = capture.text();
        let clear = format!("\r{}\r", " ".repeat("Thinking...".len() + 10));
        assert!(after_stop.ends_with(&clear));
        assert!(!after_stop.contains('\n'));

        thread::sleep(FRAME_INTERVAL * 3);
        assert_eq!(capture.text(), after_stop);
    }

    #[test]
    fn double_stop_equals_single_stop() {
        let capture = Capture::default();
        let spinner = Spinner::new(OutputHandle::new(capture.clone()), "Thinking...");

        spinner.start();
        assert!(wait_until(Duration::from_secs(2), || spinner.has_drawn()));
        spinner.stop();
        let once = capture.text();
        spinner.stop();

        assert_eq!(capture.text(), once);
    }

    #[test]
    fn start_after_stop_is_ignored() {
        let capture = Capture::default();
        let spinner = Spinner::new(OutputHandle::new(capture.clone()), "Thinking...");

        spinner.stop();
        spinner.start();
        thread::sleep(START_DELAY + FRAME_INTERVAL * 2);

        assert_eq!(capture.text(), "");
    }

    #[test]
    fn disabled_spinner_never_draws() {
        let capture = Capture::default();
        let spinner =
            Spinner::new(OutputHandle::new(capture.clone()), "Thinking...").with_enabled(false);

        spinner.start();
        thread::sleep(START_DELAY + FRAME_INTERVAL * 2);
        spinner.stop();

        assert_eq!(capture.text(), "");
    }

    #[test]
    fn narrow_terminal_truncates_frame_and_clear_to_its_width() {
        let capture = Capture {
            columns: Some(10),
            ..Capture::default()
        };
        let spinner = Spinner::new(OutputHandle::new(capture.clone()), "Thinking...");

        spinner.start();
        assert!(wait_until(Duration::from_secs(2), || spinner.has_drawn()));
        spinner.stop();

        let text = capture.text();
        assert!(text.starts_with("\r⠋ Thinkin\r"));
        assert!(!text.contains("Thinking"));
        assert!(text.ends_with(&format!("\r{}\r", " ".repeat(9))));
    }

    #[test]
    fn fit_label_counts_wide_characters() {
        assert_eq!(fit_label("Thinking...", 80), "Thinking...");
        assert_eq!(fit_label("思考中です", 9), "思考中");
        assert_eq!(fit_label("Thinking...", 2), "");
        assert_eq!(clear_width("Thinking...", 80), 21);
        assert_eq!(clear_width("Thinking...", 12), 11);
    }
}
