//! `tracing` subscriber setup.
//!
//! Logs go to `SC_LOG_FILE` when set, otherwise stderr, so they never mix with
//! the response streamed on stdout.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

/// Default filter directive when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(config: &EnvConfig) -> &'static str {
    if config.debug {
        "debug"
    } else {
        "warn"
    }
}

/// Installs the global subscriber. Returns `Ok(false)` when one is already set.
pub fn init(config: &EnvConfig) -> io::Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match config.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => builder.with_writer(io::stderr).try_init().is_ok(),
    };

    Ok(installed)
}
