//! Installed, local and remote prompt listings

use serde::Serialize;
use std::path::Path;

use crate::artifact::{self, Artifact};
use crate::error::{MarvaiError, Result};
use crate::registry::RegistryEntry;
use crate::security::{reject_symlink, validate_artifact_name, validate_source_filename};
use crate::storage::Storage;
use crate::version::is_up_to_date;

const ARTIFACT_EXT: &str = ".mprompt";

/// Summary of one `.mprompt` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptSummary {
    /// File stem, used to address the prompt
    pub name: String,
    /// Frontmatter name, or the file stem when absent
    pub display_name: String,
    pub version: String,
    pub description: String,
    pub author: String,
}

impl PromptSummary {
    fn from_artifact(stem: &str, artifact: Option<&Artifact>) -> Self {
        let mut summary = PromptSummary {
            name: stem.to_string(),
            display_name: stem.to_string(),
            ..Default::default()
        };
        let Some(artifact) = artifact else {
            return summary;
        };

        let fm = &artifact.frontmatter;
        if let Some(name) = fm.name.as_deref().filter(|n| !n.is_empty()) {
            summary.display_name = name.to_string();
        }
        summary.version = fm.version.clone().unwrap_or_default();
        summary.author = fm.author.clone().unwrap_or_default();
        summary.description = fm.description.clone().unwrap_or_default();

        if summary.description.is_empty() {
            if let Some(first) = artifact.variables.first() {
                summary.description = artifact
                    .variables
                    .iter()
                    .find(|v| v.id == "description")
                    .map(|v| v.description.clone())
                    .unwrap_or_else(|| format!("Prompts for: {}", first.description));
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPrompt {
    #[serde(flatten)]
    pub summary: PromptSummary,
    /// A `.var` file exists next to the artifact
    pub configured: bool,
}

fn read_artifact(storage: &dyn Storage, path: &Path) -> Option<Artifact> {
    if reject_symlink(storage, path).is_err() {
        return None;
    }
    let bytes = storage.read(path).ok()?;
    match artifact::parse(&bytes, &path.display().to_string()) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            tracing::warn!("Could not parse {}: {}", path.display(), e);
            None
        }
    }
}

fn artifact_stems(storage: &dyn Storage, dir: &Path) -> Result<Vec<String>> {
    let entries = storage
        .list_dir(dir)
        .map_err(|e| MarvaiError::storage("list", dir, e))?;
    Ok(entries
        .into_iter()
        .filter(|e| !e.is_dir)
        .filter_map(|e| e.name.strip_suffix(ARTIFACT_EXT).map(str::to_string))
        .filter(|stem| !stem.is_empty())
        .collect())
}

/// Prompts installed in `store_dir`; a missing directory is an empty list
pub fn list_installed(storage: &dyn Storage, store_dir: &Path) -> Result<Vec<InstalledPrompt>> {
    if !storage.is_dir(store_dir) {
        return Ok(Vec::new());
    }

    let mut prompts = Vec::new();
    for stem in artifact_stems(storage, store_dir)? {
        let artifact_path = store_dir.join(format!("{stem}{ARTIFACT_EXT}"));
        let values_path = store_dir.join(format!("{stem}.var"));
        let artifact = read_artifact(storage, &artifact_path);
        prompts.push(InstalledPrompt {
            summary: PromptSummary::from_artifact(&stem, artifact.as_ref()),
            configured: storage.exists(&values_path),
        });
    }
    Ok(prompts)
}

/// `.mprompt` files sitting in an arbitrary directory
pub fn list_local(storage: &dyn Storage, dir: &Path) -> Result<Vec<PromptSummary>> {
    if !storage.is_dir(dir) {
        return Err(MarvaiError::NotFound(format!("directory {}", dir.display())));
    }

    let mut prompts = Vec::new();
    for stem in artifact_stems(storage, dir)? {
        let filename = format!("{stem}{ARTIFACT_EXT}");
        if let Err(e) = validate_source_filename(&filename) {
            tracing::warn!("Skipping {}: {}", filename, e);
            continue;
        }
        let artifact = read_artifact(storage, &dir.join(&filename));
        prompts.push(PromptSummary::from_artifact(&stem, artifact.as_ref()));
    }
    Ok(prompts)
}

/// Local install state of a registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "local_version", rename_all = "snake_case")]
pub enum RemoteStatus {
    NotInstalled,
    UpToDate(String),
    Outdated(String),
}

impl RemoteStatus {
    /// `* ` up to date, `+ ` outdated, nothing when not installed
    pub fn marker(&self) -> &'static str {
        match self {
            RemoteStatus::NotInstalled => "",
            RemoteStatus::UpToDate(_) => "* ",
            RemoteStatus::Outdated(_) => "+ ",
        }
    }
}

pub fn remote_status(storage: &dyn Storage, store_dir: &Path, entry: &RegistryEntry) -> RemoteStatus {
    if validate_artifact_name(&entry.name).is_err() {
        return RemoteStatus::NotInstalled;
    }
    let path = store_dir.join(format!("{}{ARTIFACT_EXT}", entry.name));
    if !storage.exists(&path) {
        return RemoteStatus::NotInstalled;
    }
    let local = read_artifact(storage, &path)
        .and_then(|a| a.frontmatter.version)
        .unwrap_or_default();
    if is_up_to_date(&local, entry.version()) {
        RemoteStatus::UpToDate(local)
    } else {
        RemoteStatus::Outdated(local)
    }
}
