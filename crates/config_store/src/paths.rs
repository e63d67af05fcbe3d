use std::path::{Path, PathBuf};

use crate::error::ConfigStoreError;

pub const CONFIG_DIR_NAME: &str = ".sc";
pub const CONFIG_FILE_NAME: &str = "config";
pub const HISTORY_FILE_NAME: &str = "history";

/// Picks the config directory: an explicit override wins, then `$HOME/.sc`.
pub fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf, ConfigStoreError> {
    if let Some(dir) = explicit.filter(|dir| !dir.as_os_str().is_empty()) {
        return Ok(dir.to_path_buf());
    }

    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(CONFIG_DIR_NAME))
        .ok_or(ConfigStoreError::NoConfigDir)
}
