use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize config for {path}: {source}")]
    YamlSerialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("top level of {path} must be a mapping")]
    NotAMapping { path: PathBuf },

    #[error("invalid config key '{key}'")]
    InvalidKey { key: String },

    #[error("config key '{key}' conflicts with an existing value")]
    KeyConflict { key: String },

    #[error("expected KEY=VALUE, got '{input}'")]
    InvalidAssignment { input: String },

    #[error("invalid configuration: {message}")]
    Validation { message: String },

    #[error("cannot locate config directory: set SC_CONFIG_DIR or HOME")]
    NoConfigDir,
}

impl ConfigStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
