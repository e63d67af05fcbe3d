use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::ConfigStoreError;
use crate::flatten::scalar_to_string;

/// Providers that may be selected or configured.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Typed view of the config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default, rename = "base-url")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, Value>,
}

impl Config {
    /// Builds and validates the typed view from a parsed document.
    pub fn from_value(value: Value) -> Result<Self, ConfigStoreError> {
        let config = match value {
            Value::Null => Self::default(),
            value => serde_yaml::from_value::<Self>(value)
                .map_err(|error| ConfigStoreError::validation(error.to_string()))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Settings for `provider`, empty when the file has none.
    #[must_use]
    pub fn provider_settings(&self, provider: &str) -> ProviderSettings {
        self.providers.get(provider).cloned().unwrap_or_default()
    }

    fn validate(&self) -> Result<(), ConfigStoreError> {
        if let Some(provider) = &self.provider {
            ensure_known_provider(provider)?;
        }

        for (name, settings) in &self.providers {
            ensure_known_provider(name)?;
            settings.validate(name)?;
        }

        Ok(())
    }
}

impl ProviderSettings {
    /// Model options as strings, in key order.
    #[must_use]
    pub fn options(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .filter_map(|(key, value)| scalar_to_string(value).map(|text| (key.clone(), text)))
            .collect()
    }

    fn validate(&self, provider: &str) -> Result<(), ConfigStoreError> {
        if let Some(base_url) = &self.base_url {
            let trimmed = base_url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(ConfigStoreError::validation(format!(
                    "providers.{provider}.base-url must be an http(s) URL, got '{base_url}'"
                )));
            }
        }

        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(ConfigStoreError::validation(format!(
                    "providers.{provider}.model must not be empty"
                )));
            }
        }

        for (key, value) in &self.options {
            if scalar_to_string(value).is_none() {
                return Err(ConfigStoreError::validation(format!(
                    "providers.{provider}.options.{key} must be a scalar value"
                )));
            }
        }

        Ok(())
    }
}

fn ensure_known_provider(name: &str) -> Result<(), ConfigStoreError> {
    if KNOWN_PROVIDERS.contains(&name.trim().to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ConfigStoreError::validation(format!(
            "unknown provider '{name}' (expected one of: {})",
            KNOWN_PROVIDERS.join(", ")
        )))
    }
}
