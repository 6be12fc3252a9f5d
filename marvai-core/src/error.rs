//! Error types for the prompt lifecycle with clear, actionable messages

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a wizard section was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("variable {index} has invalid ID: {id:?}")]
    BadId { index: usize, id: String },

    #[error("variable {index} reuses the ID {id:?}")]
    DuplicateId { index: usize, id: String },

    #[error("variable {index} question too long: {len} characters (maximum is {max})")]
    PromptTooLong { index: usize, len: usize, max: usize },

    #[error("variable {index} has unsupported type: {kind:?}")]
    UnsupportedType { index: usize, kind: String },

    #[error("too many wizard variables ({count}), maximum allowed is {max}")]
    TooMany { count: usize, max: usize },

    #[error("wizard YAML section too large ({size} bytes), maximum allowed is 1MB")]
    SectionTooLarge { size: usize },

    #[error("wizard YAML is not a list of variables: {0}")]
    Yaml(String),
}

/// Errors produced while turning raw bytes into an [`Artifact`](crate::artifact::Artifact)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("{label}: mprompt content too large ({size} bytes), maximum allowed is 10MB")]
    ContentTooLarge { label: String, size: usize },

    #[error("{label}: invalid frontmatter: {reason}")]
    InvalidFrontmatter { label: String, reason: String },

    #[error("{label}: invalid wizard variables: {source}")]
    InvalidVariables {
        label: String,
        #[source]
        source: VariableError,
    },
}

/// Every failure the core can report
#[derive(Error, Debug)]
pub enum MarvaiError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid prompt name {name:?}: {reason}")]
    UnsafeName { name: String, reason: String },

    #[error("security error: file path {path:?} {reason}")]
    UnsafePath { path: PathBuf, reason: String },

    #[error("SHA256 verification failed for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("prompt '{name}' is not installed. Use 'marvai install {name}' to install it first")]
    NotInstalled { name: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("variable '{id}' is required")]
    VariableRequired { id: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid source {source_ref:?}: {reason}")]
    InvalidSource { source_ref: String, reason: String },

    #[error("error rendering template: {0}")]
    Render(String),

    #[error("failed to {action} {path:?}")]
    Storage {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid values file {path:?}: {reason}")]
    InvalidValues { path: PathBuf, reason: String },

    #[error("file {0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error("update of '{name}' rolled back: {reason}")]
    UpdateRolledBack { name: String, reason: String },

    #[error("rollback of '{name}' failed and the installation may be inconsistent (backup kept at {backup:?}): {source}")]
    RollbackFailed {
        name: String,
        backup: PathBuf,
        #[source]
        source: Box<MarvaiError>,
    },

    #[error("error reading input: {0}")]
    Input(#[source] io::Error),

    #[error("invalid CLI tool '{0}'. Available tools: claude, gemini, codex")]
    UnknownTool(String),

    #[error("error running {tool}: {reason}")]
    Execution { tool: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MarvaiError>;

impl MarvaiError {
    /// Wrap an I/O failure with the action and path it happened on
    pub fn storage(action: &'static str, path: &Path, source: io::Error) -> Self {
        MarvaiError::Storage {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn unsafe_name(name: &str, reason: impl Into<String>) -> Self {
        MarvaiError::UnsafeName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsafe_path(path: &Path, reason: impl Into<String>) -> Self {
        MarvaiError::UnsafePath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True when the error is a storage read of a file that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MarvaiError::Storage { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }

    /// Log errors that indicate tampering or an attack attempt
    pub fn log_if_security_critical(&self) {
        match self {
            MarvaiError::UnsafePath { .. } | MarvaiError::ChecksumMismatch { .. } => {
                tracing::error!(target: "security", "SECURITY VIOLATION: {}", self);
            }
            _ => {}
        }
    }
}
