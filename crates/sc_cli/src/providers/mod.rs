use std::collections::BTreeMap;
use std::sync::Arc;

use chat_provider::{ChatProvider, ProviderInitError};
use chat_provider_mock::{MockProvider, MOCK_PROVIDER_ID};
use chat_provider_ollama::{OllamaProvider, OllamaProviderConfig, OLLAMA_PROVIDER_ID};
use config_store::Config;
use tracing::debug;

pub const DEFAULT_PROVIDER_ID: &str = OLLAMA_PROVIDER_ID;

/// Flags that override the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOverrides {
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// Effective backend after applying CLI flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub provider_id: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub options: BTreeMap<String, String>,
}

pub fn resolve_selection(overrides: &ProviderOverrides, config: &Config) -> ProviderSelection {
    let provider_id = non_empty(overrides.provider.as_deref())
        .or_else(|| non_empty(config.provider.as_deref()))
        .unwrap_or(DEFAULT_PROVIDER_ID)
        .to_ascii_lowercase();

    let settings = config.provider_settings(&provider_id);
    ProviderSelection {
        base_url: non_empty(overrides.base_url.as_deref())
            .or_else(|| non_empty(settings.base_url.as_deref()))
            .map(str::to_string),
        model: non_empty(overrides.model.as_deref())
            .or_else(|| non_empty(settings.model.as_deref()))
            .map(str::to_string),
        options: settings.options(),
        provider_id,
    }
}

pub fn provider_for_selection(
    selection: &ProviderSelection,
) -> Result<Arc<dyn ChatProvider>, ProviderInitError> {
    debug!(
        provider = %selection.provider_id,
        base_url = selection.base_url.as_deref().unwrap_or("<default>"),
        model = selection.model.as_deref().unwrap_or("<default>"),
        "selecting chat provider"
    );

    match selection.provider_id.as_str() {
        OLLAMA_PROVIDER_ID => {
            let mut config = OllamaProviderConfig::new().with_options(selection.options.clone());
            if let Some(base_url) = &selection.base_url {
                config = config.with_base_url(base_url.clone());
            }
            if let Some(model) = &selection.model {
                config = config.with_model(model.clone());
            }
            Ok(Arc::new(OllamaProvider::new(config)?))
        }
        MOCK_PROVIDER_ID => {
            let mut provider = MockProvider::default();
            if let Some(model) = &selection.model {
                provider = provider.with_model_id(model.clone());
            }
            Ok(Arc::new(provider))
        }
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {OLLAMA_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        ))),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
