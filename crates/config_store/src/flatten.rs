use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::error::ConfigStoreError;

/// Flattens nested mappings into dot-separated keys, sorted by key.
///
/// `{providers: {ollama: {model: x}}}` becomes `providers.ollama.model = x`.
/// Null leaves are dropped.
#[must_use]
pub fn flatten(value: &Value) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    flatten_into(value, "", &mut result);
    result
}

fn flatten_into(value: &Value, prefix: &str, result: &mut BTreeMap<String, String>) {
    match value {
        Value::Mapping(mapping) => {
            for (key, nested) in mapping {
                let Some(key) = scalar_to_string(key) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(nested, &path, result);
            }
        }
        Value::Tagged(tagged) => flatten_into(&tagged.value, prefix, result),
        Value::Null => {}
        leaf => {
            if prefix.is_empty() {
                return;
            }
            if let Some(text) = scalar_to_string(leaf).or_else(|| sequence_to_string(leaf)) {
                result.insert(prefix.to_string(), text);
            }
        }
    }
}

/// Rebuilds a nested mapping from dot-separated keys.
pub fn unflatten(flat: &BTreeMap<String, String>) -> Result<Value, ConfigStoreError> {
    let mut root = Mapping::new();

    for (key, value) in flat {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|part| part.trim().is_empty()) {
            return Err(ConfigStoreError::InvalidKey { key: key.clone() });
        }

        let (leaf, parents) = parts
            .split_last()
            .ok_or_else(|| ConfigStoreError::InvalidKey { key: key.clone() })?;

        let mut current = &mut root;
        for part in parents {
            let entry = current
                .entry(Value::String((*part).to_string()))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            current = match entry {
                Value::Mapping(mapping) => mapping,
                _ => return Err(ConfigStoreError::KeyConflict { key: key.clone() }),
            };
        }

        let leaf = Value::String((*leaf).to_string());
        if matches!(current.get(&leaf), Some(Value::Mapping(_))) {
            return Err(ConfigStoreError::KeyConflict { key: key.clone() });
        }
        current.insert(leaf, Value::String(value.clone()));
    }

    Ok(Value::Mapping(root))
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

fn sequence_to_string(value: &Value) -> Option<String> {
    let Value::Sequence(items) = value else {
        return None;
    };
    let items: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
    Some(format!("[{}]", items.join(", ")))
}
