//! Streaming chat CLI runtime.
//!
//! ## Cancellation contract
//!
//! Each prompt is streamed by [`consumer::StreamConsumer`], which registers the
//! in-flight session (subscription, completion signal, spinner) with the
//! shared [`coordinator::SessionCoordinator`] before blocking. SIGINT calls
//! [`coordinator::SessionCoordinator::cancel`] from the signal thread: the
//! spinner stops, the subscription is disposed so no further chunk is
//! written, and the blocked REPL wakes and returns to the prompt.
//!
//! SIGTERM and SIGHUP interrupt the blocked wait instead; the consumer tears
//! the session down itself and the REPL exits. A signal that finds no
//! response in flight ends the process with the signal's default action
//! (see [`signals::SignalRouter`]), except SIGINT at an interactive prompt.
//!
//! ## Provider selection
//!
//! `--provider`/`--base-url`/`--model` flags win over the config file
//! (`$SC_CONFIG_DIR/config`, default `~/.sc/config`), which wins over the
//! built-in defaults (`ollama`, model `llama3.2`).

use std::sync::{Mutex, MutexGuard};

pub mod app;
pub mod cli;
pub mod commands;
pub mod completion;
pub mod consumer;
pub mod coordinator;
pub mod prompt;
pub mod providers;
pub mod repl;
pub mod signals;
pub mod subscription;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
