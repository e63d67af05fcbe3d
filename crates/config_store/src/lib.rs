mod error;
mod flatten;
mod paths;
mod schema;
mod store;

pub use error::ConfigStoreError;
pub use flatten::{flatten, unflatten};
pub use paths::{resolve_config_dir, CONFIG_DIR_NAME, CONFIG_FILE_NAME, HISTORY_FILE_NAME};
pub use schema::{Config, ProviderSettings, KNOWN_PROVIDERS};
pub use store::{parse_assignment, ConfigStore};
