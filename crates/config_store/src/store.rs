use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::ConfigStoreError;
use crate::flatten::{flatten, unflatten};
use crate::paths::{resolve_config_dir, CONFIG_FILE_NAME, HISTORY_FILE_NAME};
use crate::schema::Config;

/// YAML config file rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Opens the store at `explicit`, or `$HOME/.sc` when absent.
    pub fn open(explicit: Option<&Path>) -> Result<Self, ConfigStoreError> {
        resolve_config_dir(explicit).map(Self::new)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE_NAME)
    }

    /// Creates the directory and an empty config file if missing.
    pub fn init(&self) -> Result<PathBuf, ConfigStoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| {
            ConfigStoreError::io("creating config directory", &self.dir, source)
        })?;

        let path = self.file_path();
        if !path.exists() {
            fs::write(&path, "")
                .map_err(|source| ConfigStoreError::io("creating config file", &path, source))?;
        }
        Ok(path)
    }

    /// All settings as sorted dot-separated keys.
    pub fn list(&self) -> Result<BTreeMap<String, String>, ConfigStoreError> {
        Ok(flatten(&self.load_document()?))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigStoreError> {
        Ok(self.list()?.remove(key))
    }

    /// Typed, validated view of the file. A missing file yields defaults.
    pub fn load(&self) -> Result<Config, ConfigStoreError> {
        Config::from_value(self.load_document()?)
    }

    /// Merges `values` into the file. If the result does not validate, the
    /// previous file contents are restored and the validation error returned.
    pub fn set(&self, values: &BTreeMap<String, String>) -> Result<(), ConfigStoreError> {
        let previous = self.read_raw()?;
        let mut flat = self.list()?;
        flat.extend(values.iter().map(|(key, value)| (key.clone(), value.clone())));
        self.save_document(&unflatten(&flat)?)?;

        if let Err(error) = self.load() {
            warn!(error = %error, "config update failed validation; rolling back");
            self.restore_raw(previous)?;
            return Err(error);
        }

        debug!(keys = values.len(), path = %self.file_path().display(), "config updated");
        Ok(())
    }

    /// Removes `keys`; unknown keys are ignored.
    pub fn unset<S: AsRef<str>>(&self, keys: &[S]) -> Result<(), ConfigStoreError> {
        let mut flat = self.list()?;
        for key in keys {
            flat.remove(key.as_ref());
        }
        self.save_document(&unflatten(&flat)?)
    }

    fn read_raw(&self) -> Result<Option<String>, ConfigStoreError> {
        let path = self.file_path();
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigStoreError::io("reading config file", &path, source)),
        }
    }

    fn restore_raw(&self, previous: Option<String>) -> Result<(), ConfigStoreError> {
        let path = self.file_path();
        match previous {
            Some(raw) => fs::write(&path, raw)
                .map_err(|source| ConfigStoreError::io("restoring config file", &path, source)),
            None => fs::remove_file(&path)
                .map_err(|source| ConfigStoreError::io("removing config file", &path, source)),
        }
    }

    fn load_document(&self) -> Result<Value, ConfigStoreError> {
        let path = self.file_path();
        let Some(raw) = self.read_raw()? else {
            return Ok(Value::Null);
        };
        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value = serde_yaml::from_str(&raw)
            .map_err(|source| ConfigStoreError::YamlParse { path: path.clone(), source })?;
        match value {
            Value::Mapping(_) | Value::Null => Ok(value),
            _ => Err(ConfigStoreError::NotAMapping { path }),
        }
    }

    fn save_document(&self, value: &Value) -> Result<(), ConfigStoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| {
            ConfigStoreError::io("creating config directory", &self.dir, source)
        })?;

        let path = self.file_path();
        let is_empty = matches!(value, Value::Mapping(mapping) if mapping.is_empty());
        let rendered = if is_empty {
            String::new()
        } else {
            serde_yaml::to_string(value).map_err(|source| ConfigStoreError::YamlSerialize {
                path: path.clone(),
                source,
            })?
        };

        fs::write(&path, rendered)
            .map_err(|source| ConfigStoreError::io("writing config file", &path, source))
    }
}

/// Splits a `KEY=VALUE` argument. The value may itself contain `=`.
pub fn parse_assignment(input: &str) -> Result<(String, String), ConfigStoreError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ConfigStoreError::InvalidAssignment {
            input: input.to_string(),
        })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigStoreError::InvalidAssignment {
            input: input.to_string(),
        });
    }

    Ok((key.to_string(), value.trim().to_string()))
}
