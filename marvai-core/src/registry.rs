//! Remote registry manifest (`PROMPTS`)
//!
//! The manifest is a list of YAML mappings separated by bare `--` lines. A
//! bad entry does not spoil the rest: it is skipped, logged and counted.

use serde::{Deserialize, Serialize};

use crate::security::validate_artifact_name;

/// One published prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    #[serde(default, deserialize_with = "crate::artifact::lenient_string")]
    pub version: Option<String>,

    /// Path of the `.mprompt` file relative to the repository
    #[serde(default)]
    pub file: String,

    /// Hex SHA-256 of the template body
    #[serde(default, alias = "checksum", skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl RegistryEntry {
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }
}

/// Parsed manifest plus the number of entries that were dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryManifest {
    pub entries: Vec<RegistryEntry>,
    pub skipped: usize,
}

impl RegistryManifest {
    pub fn parse(text: &str) -> Self {
        let mut chunks: Vec<Vec<&str>> = vec![Vec::new()];
        for line in text.split('\n') {
            if line.trim() == "--" {
                chunks.push(Vec::new());
            } else if let Some(chunk) = chunks.last_mut() {
                chunk.push(line);
            }
        }

        let mut manifest = RegistryManifest::default();
        for (i, chunk) in chunks.iter().enumerate() {
            let body = chunk.join("\n");
            if body.trim().is_empty() {
                continue;
            }

            let entry: RegistryEntry = match serde_yaml_ng::from_str(&body) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Failed to parse prompt entry {}: {}", i + 1, e);
                    manifest.skipped += 1;
                    continue;
                }
            };

            if entry.name.is_empty() || entry.file.is_empty() {
                tracing::warn!(
                    "Prompt entry {} missing required fields (name: {:?}, file: {:?})",
                    i + 1,
                    entry.name,
                    entry.file
                );
                manifest.skipped += 1;
                continue;
            }

            if let Err(e) = validate_artifact_name(&entry.name) {
                tracing::warn!("Prompt entry {} has an unsafe name: {}", i + 1, e);
                manifest.skipped += 1;
                continue;
            }

            if entry.file.contains("..") || entry.file.starts_with('/') || entry.file.contains('\\')
            {
                tracing::warn!(
                    "Prompt entry {} has an unsafe file path: {:?}",
                    i + 1,
                    entry.file
                );
                manifest.skipped += 1;
                continue;
            }

            manifest.entries.push(entry);
        }

        if manifest.skipped > 0 {
            tracing::warn!("Skipped {} invalid prompt entries", manifest.skipped);
        }
        manifest
    }

    /// Exact case-insensitive name match first, then the first entry whose
    /// description mentions the name
    pub fn find_by_name(&self, name: &str) -> Option<&RegistryEntry> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.name.to_lowercase() == needle)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.description.to_lowercase().contains(&needle))
            })
    }
}
