//! Stored answers to the wizard, persisted as `<name>.var`

use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::artifact::VariableSpec;
use crate::error::{MarvaiError, Result};
use crate::storage::Storage;

/// Variable id → answer, kept sorted so saved files are deterministic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedValues(BTreeMap<String, String>);

impl ResolvedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.0.insert(id.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fill in every declared variable: missing optional ones become empty,
    /// missing required ones are an error
    pub fn resolve(&self, specs: &[VariableSpec]) -> Result<ResolvedValues> {
        let mut resolved = self.clone();
        for spec in specs {
            if resolved.0.contains_key(&spec.id) {
                continue;
            }
            if spec.required {
                return Err(MarvaiError::VariableRequired {
                    id: spec.id.clone(),
                });
            }
            resolved.insert(spec.id.clone(), String::new());
        }
        Ok(resolved)
    }

    /// Parse a flat YAML map; scalar values are stringified
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self> {
        let invalid = |reason: String| MarvaiError::InvalidValues {
            path: path.to_path_buf(),
            reason,
        };

        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: Option<BTreeMap<String, Value>> =
            serde_yaml_ng::from_str(text).map_err(|e| invalid(e.to_string()))?;

        let mut values = BTreeMap::new();
        for (key, value) in raw.unwrap_or_default() {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => return Err(invalid(format!("value for '{key}' is not a string"))),
            };
            values.insert(key, value);
        }
        Ok(Self(values))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(&self.0).map_err(|e| MarvaiError::InvalidValues {
            path: Default::default(),
            reason: e.to_string(),
        })
    }

    /// Load from storage; a missing file is a not-found storage error
    pub fn load(storage: &dyn Storage, path: &Path) -> Result<Self> {
        let text = storage
            .read_to_string(path)
            .map_err(|e| MarvaiError::storage("read", path, e))?;
        Self::from_yaml(&text, path)
    }

    /// Overwrite `path` with these values
    pub fn save(&self, storage: &dyn Storage, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        storage
            .write(path, yaml.as_bytes())
            .map_err(|e| MarvaiError::storage("write", path, e))
    }
}

impl FromIterator<(String, String)> for ResolvedValues {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
