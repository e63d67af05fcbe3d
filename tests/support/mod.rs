#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sc_term::Terminal;

/// Terminal that records everything written to it.
#[derive(Clone, Default)]
pub struct RecordingTerminal {
    written: Arc<Mutex<String>>,
    flushes: Arc<Mutex<usize>>,
}

impl RecordingTerminal {
    pub fn output(&self) -> String {
        self.written.lock().expect("recording lock poisoned").clone()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().expect("flush lock poisoned")
    }
}

impl Terminal for RecordingTerminal {
    fn write(&mut self, data: &str) {
        self.written
            .lock()
            .expect("recording lock poisoned")
            .push_str(data);
    }

    fn flush(&mut self) -> io::Result<()> {
        *self.flushes.lock().expect("flush lock poisoned") += 1;
        Ok(())
    }

    fn columns(&self) -> u16 {
        80
    }
}

pub fn wait_until(timeout: Duration, tick: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(tick);
    }
    predicate()
}
