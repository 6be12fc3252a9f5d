//! Installing, updating and loading prompts in `.marvai/`
//!
//! [`PromptManager`] owns the on-disk files of every installed prompt:
//!
//! ```text
//! .marvai/
//!     <name>.mprompt         ← artifact, stamped with its source
//!     <name>.var             ← saved wizard answers
//!     <name>.mprompt.backup  ← only while an update is in flight
//!     marvai.log             ← activity log
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::activity::ActivityLog;
use crate::agent::{self, CliTool, CommandRunner};
use crate::artifact::{self, stamp_provenance, Artifact, SourceKind};
use crate::config::{MarvaiConfig, STORE_DIR};
use crate::error::{MarvaiError, Result};
use crate::registry::{RegistryEntry, RegistryManifest};
use crate::render::PromptRenderer;
use crate::security::{reject_symlink, validate_artifact_name, validate_stored_path};
use crate::source::{ContentSource, Locator};
use crate::storage::Storage;
use crate::values::ResolvedValues;
use crate::version::is_up_to_date;
use crate::wizard::{run_wizard, Prompter};

/// Name used when a URL has no usable last segment
pub const FALLBACK_URL_NAME: &str = "downloaded-prompt";

/// What `marvai install <source>` refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    /// A URL or local path, with the name to use when the frontmatter has none
    Direct {
        locator: Locator,
        fallback_name: String,
        kind: SourceKind,
    },
    /// A prompt name looked up in a registry repository
    Named(String),
}

impl InstallTarget {
    pub fn classify(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.starts_with("http://") {
            return Err(MarvaiError::InvalidSource {
                source_ref: source.to_string(),
                reason: "only HTTPS URLs are allowed".to_string(),
            });
        }

        if source.starts_with("https://") {
            return Ok(InstallTarget::Direct {
                locator: Locator::Url(source.to_string()),
                fallback_name: name_from_url(source),
                kind: SourceKind::classify(source),
            });
        }

        if source.ends_with(".mprompt") || source.contains('/') {
            let path = if source.ends_with(".mprompt") {
                PathBuf::from(source)
            } else {
                PathBuf::from(format!("{source}.mprompt"))
            };
            let fallback_name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(InstallTarget::Direct {
                locator: Locator::Local(path),
                fallback_name,
                kind: SourceKind::Local,
            });
        }

        Ok(InstallTarget::Named(source.to_string()))
    }
}

/// Last non-empty path segment without `.mprompt`
fn name_from_url(url: &str) -> String {
    let path = url
        .trim_start_matches("https://")
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    segments.next(); // host
    segments
        .last()
        .map(|s| s.strip_suffix(".mprompt").unwrap_or(s).to_string())
        .filter(|s| !s.is_empty() && validate_artifact_name(s).is_ok())
        .unwrap_or_else(|| FALLBACK_URL_NAME.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        name: String,
        path: PathBuf,
        /// Wizard answers were saved to `.var`
        configured: bool,
    },
    /// Nothing was written; reports which files were already there
    AlreadyInstalled {
        name: String,
        artifact_exists: bool,
        values_exist: bool,
    },
}

impl InstallOutcome {
    pub fn name(&self) -> &str {
        match self {
            InstallOutcome::Installed { name, .. } | InstallOutcome::AlreadyInstalled { name, .. } => {
                name
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate {
        version: String,
    },
    /// The user said no to the update
    Declined {
        available: String,
    },
    Updated {
        from: String,
        to: String,
        /// The wizard failed and the user kept the new version anyway
        needs_configuration: bool,
    },
}

/// Everything fetched and checked for one artifact, ready to persist
struct Prepared {
    raw: String,
    artifact: Artifact,
    label: String,
}

pub struct PromptManager {
    storage: Arc<dyn Storage>,
    source: Arc<dyn ContentSource>,
    renderer: PromptRenderer,
    activity: ActivityLog,
    config: MarvaiConfig,
    store_dir: PathBuf,
}

impl PromptManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        source: Arc<dyn ContentSource>,
        config: MarvaiConfig,
    ) -> Self {
        Self {
            activity: ActivityLog::new(storage.clone(), STORE_DIR),
            storage,
            source,
            renderer: PromptRenderer::new(),
            config,
            store_dir: PathBuf::from(STORE_DIR),
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn config(&self) -> &MarvaiConfig {
        &self.config
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{name}.mprompt"))
    }

    pub fn values_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{name}.var"))
    }

    pub fn backup_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{name}.mprompt.backup"))
    }

    /// Install from a URL, a local path or a registry name, and record the
    /// attempt in the activity log
    pub async fn install(
        &self,
        source: &str,
        repo: Option<&str>,
        prompter: &mut dyn Prompter,
    ) -> Result<InstallOutcome> {
        let result = match InstallTarget::classify(source) {
            Ok(InstallTarget::Direct {
                locator,
                fallback_name,
                kind,
            }) => self.install_direct(&locator, &fallback_name, kind, prompter).await,
            Ok(InstallTarget::Named(name)) => self.install_by_name(&name, repo, prompter).await,
            Err(e) => Err(e),
        };

        let repo = repo.map(str::trim).filter(|r| !r.is_empty());
        match &result {
            Ok(outcome) => self.activity.record_install(outcome.name(), repo, true),
            Err(e) => {
                e.log_if_security_critical();
                self.activity.record_install(source, repo, false);
            }
        }
        result
    }

    pub async fn install_direct(
        &self,
        locator: &Locator,
        fallback_name: &str,
        kind: SourceKind,
        prompter: &mut dyn Prompter,
    ) -> Result<InstallOutcome> {
        let prepared = self.prepare(locator, locator.to_string(), None).await?;
        self.persist_new(prepared, fallback_name, kind, None, prompter)
    }

    pub async fn install_by_name(
        &self,
        name: &str,
        repo: Option<&str>,
        prompter: &mut dyn Prompter,
    ) -> Result<InstallOutcome> {
        validate_artifact_name(name)?;
        let repo = self.config.repo_or_default(repo).to_string();
        let entry = self.lookup(name, &repo).await?;

        let locator = Locator::Registry {
            repo: repo.clone(),
            file: entry.file.clone(),
        };
        let prepared = self
            .prepare(&locator, format!("remote-{name}"), entry.sha256.as_deref())
            .await?;
        self.persist_new(
            prepared,
            name,
            SourceKind::Distro,
            Some(&entry.file),
            prompter,
        )
    }

    /// The manifest of `repo`, or of the default repository
    pub async fn manifest(&self, repo: Option<&str>) -> Result<RegistryManifest> {
        let repo = self.config.repo_or_default(repo);
        validate_artifact_name(repo)
            .map_err(|_| MarvaiError::unsafe_name(repo, "invalid repository name"))?;
        let manifest = self.source.fetch_manifest(repo).await?;
        if manifest.skipped > 0 {
            tracing::warn!("Skipped {} invalid prompt entries in '{}'", manifest.skipped, repo);
        }
        Ok(manifest)
    }

    async fn lookup(&self, name: &str, repo: &str) -> Result<RegistryEntry> {
        self.manifest(Some(repo))
            .await?
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| MarvaiError::NotFound(format!("prompt '{name}' in repository '{repo}'")))
    }

    /// Fetch, parse and verify; nothing is written
    async fn prepare(
        &self,
        locator: &Locator,
        label: String,
        checksum: Option<&str>,
    ) -> Result<Prepared> {
        let bytes = self.source.fetch(locator).await?;
        let artifact = artifact::parse(&bytes, &label)?;

        if let Some(expected) = checksum.filter(|c| !c.trim().is_empty()) {
            if !artifact.matches_checksum(expected) {
                let err = MarvaiError::ChecksumMismatch {
                    name: label,
                    expected: expected.to_string(),
                    actual: artifact.template_digest(),
                };
                err.log_if_security_critical();
                return Err(err);
            }
            tracing::info!("Verified SHA256 for {}", label);
        }

        Ok(Prepared {
            raw: String::from_utf8_lossy(&bytes).into_owned(),
            artifact,
            label,
        })
    }

    fn derive_name(artifact: &Artifact, fallback: &str) -> Result<String> {
        if let Some(name) = artifact.frontmatter.name.as_deref() {
            if validate_artifact_name(name).is_ok() {
                return Ok(name.to_string());
            }
            tracing::debug!("Frontmatter name {:?} is not usable, using {:?}", name, fallback);
        }
        validate_artifact_name(fallback)?;
        Ok(fallback.to_string())
    }

    fn persist_new(
        &self,
        prepared: Prepared,
        fallback_name: &str,
        kind: SourceKind,
        file: Option<&str>,
        prompter: &mut dyn Prompter,
    ) -> Result<InstallOutcome> {
        let name = Self::derive_name(&prepared.artifact, fallback_name)?;
        let artifact_path = self.artifact_path(&name);
        let values_path = self.values_path(&name);
        validate_stored_path(&artifact_path, &self.store_dir)?;
        validate_stored_path(&values_path, &self.store_dir)?;

        let artifact_exists = self.storage.exists(&artifact_path);
        let values_exist = self.storage.exists(&values_path);
        if artifact_exists || values_exist {
            tracing::info!("Prompt '{}' is already installed", name);
            return Ok(InstallOutcome::AlreadyInstalled {
                name,
                artifact_exists,
                values_exist,
            });
        }

        let stamped = stamp_provenance(&prepared.raw, &prepared.label, kind, file)?;
        self.storage
            .create_dir_all(&self.store_dir)
            .map_err(|e| MarvaiError::storage("create", &self.store_dir, e))?;
        self.storage
            .write(&artifact_path, stamped.as_bytes())
            .map_err(|e| MarvaiError::storage("write", &artifact_path, e))?;

        let mut configured = false;
        if !prepared.artifact.variables.is_empty() {
            let values = run_wizard(&prepared.artifact.variables, prompter, None)?;
            values.save(self.storage.as_ref(), &values_path)?;
            configured = true;
        }

        tracing::info!("Installed {} to {}", name, artifact_path.display());
        Ok(InstallOutcome::Installed {
            name,
            path: artifact_path,
            configured,
        })
    }

    /// Version recorded in an installed artifact, empty when unknown
    pub fn installed_version(&self, name: &str) -> String {
        let path = self.artifact_path(name);
        self.storage
            .read(&path)
            .ok()
            .and_then(|bytes| artifact::parse(&bytes, name).ok())
            .map(|a| a.version().to_string())
            .unwrap_or_default()
    }

    /// Update an installed prompt from its registry repository
    ///
    /// The current artifact is backed up first; any failure before the new
    /// artifact is in place leaves the installation untouched.
    pub async fn update(
        &self,
        name: &str,
        repo: Option<&str>,
        prompter: &mut dyn Prompter,
    ) -> Result<UpdateOutcome> {
        validate_artifact_name(name)?;
        let artifact_path = self.artifact_path(name);
        let values_path = self.values_path(name);
        let backup_path = self.backup_path(name);
        validate_stored_path(&artifact_path, &self.store_dir)?;

        if !self.storage.exists(&artifact_path) {
            return Err(MarvaiError::NotInstalled {
                name: name.to_string(),
            });
        }

        let current = self.installed_version(name);
        let repo = self.config.repo_or_default(repo).to_string();
        let entry = self.lookup(name, &repo).await?;
        let available = entry.version().to_string();

        if !current.is_empty() && is_up_to_date(&current, &available) {
            return Ok(UpdateOutcome::UpToDate { version: current });
        }

        let question = format!("Do you want to update '{name}' to version {available}?");
        if !prompter.confirm(&question)? {
            return Ok(UpdateOutcome::Declined { available });
        }

        let existing = if self.storage.exists(&values_path) {
            ResolvedValues::load(self.storage.as_ref(), &values_path).unwrap_or_else(|e| {
                tracing::warn!("Could not load existing values for '{}': {}", name, e);
                ResolvedValues::new()
            })
        } else {
            ResolvedValues::new()
        };

        self.storage
            .copy(&artifact_path, &backup_path)
            .map_err(|e| MarvaiError::storage("back up", &artifact_path, e))?;

        let locator = Locator::Registry {
            repo,
            file: entry.file.clone(),
        };
        let staged = match self.stage_update(&locator, name, &entry).await {
            Ok(staged) => staged,
            Err(e) => {
                self.discard_backup(&backup_path);
                return Err(e);
            }
        };

        if let Err(write_err) = self
            .storage
            .write(&artifact_path, staged.0.as_bytes())
            .map_err(|e| MarvaiError::storage("write", &artifact_path, e))
        {
            self.restore_backup(name, &backup_path, &artifact_path)?;
            self.discard_backup(&backup_path);
            return Err(write_err);
        }

        let mut needs_configuration = false;
        let variables = &staged.1.variables;
        if !variables.is_empty() {
            match run_wizard(variables, prompter, Some(&existing)) {
                Ok(values) => {
                    if let Err(e) = values.save(self.storage.as_ref(), &values_path) {
                        tracing::warn!("Could not save new configuration for '{}': {}", name, e);
                    }
                }
                Err(wizard_err) => {
                    tracing::warn!("Configuration wizard failed for '{}': {}", name, wizard_err);
                    let rollback = prompter
                        .confirm("Do you want to rollback to the previous version?")
                        .unwrap_or_else(|e| {
                            tracing::warn!(
                                "Could not ask about rollback for '{}', keeping the new version: {}",
                                name,
                                e
                            );
                            false
                        });
                    if rollback {
                        self.restore_backup(name, &backup_path, &artifact_path)?;
                        self.discard_backup(&backup_path);
                        return Err(MarvaiError::UpdateRolledBack {
                            name: name.to_string(),
                            reason: wizard_err.to_string(),
                        });
                    }
                    needs_configuration = true;
                }
            }
        }

        self.discard_backup(&backup_path);
        tracing::info!("Updated '{}' from {:?} to {}", name, current, available);
        Ok(UpdateOutcome::Updated {
            from: current,
            to: available,
            needs_configuration,
        })
    }

    async fn stage_update(
        &self,
        locator: &Locator,
        name: &str,
        entry: &RegistryEntry,
    ) -> Result<(String, Artifact)> {
        let prepared = self
            .prepare(locator, format!("remote-{name}"), entry.sha256.as_deref())
            .await?;
        let stamped = stamp_provenance(
            &prepared.raw,
            &prepared.label,
            SourceKind::Distro,
            Some(&entry.file),
        )?;
        Ok((stamped, prepared.artifact))
    }

    fn restore_backup(&self, name: &str, backup: &Path, target: &Path) -> Result<()> {
        self.storage.copy(backup, target).map_err(|e| {
            let err = MarvaiError::RollbackFailed {
                name: name.to_string(),
                backup: backup.to_path_buf(),
                source: Box::new(MarvaiError::storage("restore", target, e)),
            };
            tracing::error!("{}", err);
            err
        })?;
        tracing::info!("Restored '{}' from backup", name);
        Ok(())
    }

    fn discard_backup(&self, backup: &Path) {
        if let Err(e) = self.storage.remove(backup) {
            tracing::warn!("Could not remove backup {}: {}", backup.display(), e);
        }
    }

    /// Render an installed prompt with its saved values
    pub fn render(&self, name: &str) -> Result<String> {
        validate_artifact_name(name)?;
        let artifact_path = self.artifact_path(name);
        let values_path = self.values_path(name);

        for path in [&artifact_path, &values_path] {
            reject_symlink(self.storage.as_ref(), path)?;
            validate_stored_path(path, &self.store_dir)?;
        }

        let bytes = self.storage.read(&artifact_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MarvaiError::NotInstalled {
                    name: name.to_string(),
                }
            } else {
                MarvaiError::storage("read", &artifact_path, e)
            }
        })?;
        let artifact = artifact::parse(&bytes, name)?;

        let saved = match ResolvedValues::load(self.storage.as_ref(), &values_path) {
            Ok(values) => values,
            Err(e) if e.is_not_found() => ResolvedValues::new(),
            Err(e) => return Err(e),
        };
        let values = saved.resolve(&artifact.variables)?;

        self.renderer.render(&artifact.template, &values)
    }

    /// Render and hand the prompt to an AI CLI, logging the outcome
    pub async fn execute(
        &self,
        name: &str,
        tool: CliTool,
        runner: &dyn CommandRunner,
    ) -> Result<()> {
        let result = match self.render(name) {
            Ok(prompt) => {
                let timeout = Duration::from_secs(self.config.stdin_write_timeout_secs);
                agent::run_prompt(runner, tool, &prompt, timeout).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            e.log_if_security_critical();
        }
        self.activity
            .record_execution(name, tool.as_str(), result.is_ok());
        result
    }
}
