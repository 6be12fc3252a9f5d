//! Tool configuration
//!
//! Read from `config.yaml` in the platform config directory. Every field has a
//! default, so a missing file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default registry base URL
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.marvai.dev/dist";

/// Repository used when none is given
pub const DEFAULT_REPO: &str = "marvai";

/// Environment variable that overrides `registry_url`
pub const REGISTRY_URL_ENV: &str = "MARVAI_REGISTRY_URL";

/// Directory holding installed prompts, relative to the working directory
pub const STORE_DIR: &str = ".marvai";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarvaiConfig {
    /// Base URL; manifests live at `<registry_url>/<repo>/PROMPTS`
    pub registry_url: String,

    pub default_repo: String,

    pub http_timeout_secs: u64,

    /// Upper bound for handing the prompt to the AI CLI
    pub stdin_write_timeout_secs: u64,
}

impl Default for MarvaiConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            default_repo: DEFAULT_REPO.to_string(),
            http_timeout_secs: 30,
            stdin_write_timeout_secs: 10,
        }
    }
}

impl MarvaiConfig {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config = match Self::config_dir() {
            Some(dir) => Self::load_from_path(&dir.join("config.yaml"))?,
            None => {
                tracing::debug!("No config directory available, using defaults");
                Self::default()
            }
        };
        Ok(config.with_env_overrides())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "marvai", "marvai")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| dirs::config_dir().map(|d| d.join("marvai")))
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(REGISTRY_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                tracing::debug!("Registry URL overridden by {}: {}", REGISTRY_URL_ENV, url);
                self.registry_url = url.to_string();
            }
        }
        self
    }

    /// `repo` if given and non-blank, otherwise the default
    pub fn repo_or_default<'a>(&'a self, repo: Option<&'a str>) -> &'a str {
        match repo.map(str::trim) {
            Some(r) if !r.is_empty() => r,
            _ => &self.default_repo,
        }
    }

    pub fn manifest_url(&self, repo: &str) -> String {
        format!("{}/{}/PROMPTS", self.registry_url.trim_end_matches('/'), repo)
    }

    pub fn artifact_url(&self, repo: &str, file: &str) -> String {
        format!("{}/{}/{}", self.registry_url.trim_end_matches('/'), repo, file)
    }
}
