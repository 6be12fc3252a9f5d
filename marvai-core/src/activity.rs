//! Append-only activity log at `.marvai/marvai.log`
//!
//! Lines look like `[2025-01-31 09:15:02] INSTALL_PROMPT: code-review - Successfully installed from default repo`.
//! Failing to write the log never fails the operation being logged.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::Storage;

pub const LOG_FILE: &str = "marvai.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    InstallPrompt,
    ExecutePrompt,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::InstallPrompt => "INSTALL_PROMPT",
            Action::ExecutePrompt => "EXECUTE_PROMPT",
        })
    }
}

pub struct ActivityLog {
    storage: Arc<dyn Storage>,
    dir: PathBuf,
}

impl ActivityLog {
    pub fn new(storage: Arc<dyn Storage>, dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            dir: dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn record(&self, action: Action, name: &str, details: &str) {
        let line = format!(
            "[{}] {}: {} - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            action,
            name,
            details
        );
        if let Err(e) = self.append(&line) {
            tracing::warn!("Failed to write activity log: {}", e);
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        self.storage.create_dir_all(&self.dir)?;
        self.storage.append(&self.path(), line.as_bytes())
    }

    pub fn record_install(&self, name: &str, repo: Option<&str>, success: bool) {
        let details = match (success, repo) {
            (true, Some(repo)) => format!("Successfully installed from repo: {repo}"),
            (true, None) => "Successfully installed from default repo".to_string(),
            (false, _) => "Installation failed".to_string(),
        };
        self.record(Action::InstallPrompt, name, &details);
    }

    pub fn record_execution(&self, name: &str, tool: &str, success: bool) {
        let details = if success {
            format!("Successfully executed with {tool}")
        } else {
            format!("Execution failed with {tool}")
        };
        self.record(Action::ExecutePrompt, name, &details);
    }
}
