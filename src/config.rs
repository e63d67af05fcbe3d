//! Environment configuration.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Overrides the config directory (`$HOME/.sc` otherwise).
    pub config_dir: Option<PathBuf>,
    /// Sends logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Raises the default log level to `debug`.
    pub debug: bool,
    /// Disables the progress spinner.
    pub no_spinner: bool,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            config_dir: env_string_opt("SC_CONFIG_DIR").map(PathBuf::from),
            log_file: env_string_opt("SC_LOG_FILE").map(PathBuf::from),
            debug: env_flag("SC_DEBUG"),
            no_spinner: env_flag("SC_NO_SPINNER"),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
