//! Safety checks applied to untrusted names, paths and wizard definitions
//!
//! Everything in here is a pure function except [`reject_symlink`], which
//! asks the storage backend about the target.

use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::artifact::VariableSpec;
use crate::error::{MarvaiError, Result, VariableError};
use crate::storage::Storage;

/// Largest `.mprompt` document accepted (10 MiB)
pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

/// Largest frontmatter or wizard section accepted (1 MiB)
pub const MAX_SECTION_SIZE: usize = 1024 * 1024;

/// Largest registry manifest accepted (1 MiB)
pub const MAX_MANIFEST_SIZE: usize = 1024 * 1024;

pub const MAX_VARIABLES: usize = 100;
pub const MAX_PROMPT_TEXT_LEN: usize = 1000;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_FILENAME_LEN: usize = 255;

/// Identifiers that collide with object internals in template engines
pub const DENIED_VARIABLE_IDS: &[&str] =
    &["__proto__", "constructor", "prototype", "toString", "valueOf"];

/// Check a prompt name before it is turned into a file path
pub fn validate_artifact_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MarvaiError::unsafe_name(name, "name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(MarvaiError::unsafe_name(
            name,
            format!("name too long (max {MAX_NAME_LEN} characters)"),
        ));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(MarvaiError::unsafe_name(
            name,
            "name contains path separators or traversal sequences",
        ));
    }
    if name.chars().any(|c| (c as u32) < 32 || c as u32 == 127) {
        return Err(MarvaiError::unsafe_name(
            name,
            "name contains control characters",
        ));
    }
    Ok(())
}

/// `[A-Za-z0-9_-]+` and not on the deny-list
pub fn validate_variable_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !DENIED_VARIABLE_IDS.contains(&id)
}

/// Validate a parsed wizard section as a whole
pub fn validate_variables(specs: &[VariableSpec]) -> std::result::Result<(), VariableError> {
    if specs.len() > MAX_VARIABLES {
        return Err(VariableError::TooMany {
            count: specs.len(),
            max: MAX_VARIABLES,
        });
    }

    let mut seen = HashSet::new();
    for (index, spec) in specs.iter().enumerate() {
        if !validate_variable_id(&spec.id) {
            return Err(VariableError::BadId {
                index,
                id: spec.id.clone(),
            });
        }
        if !seen.insert(spec.id.as_str()) {
            return Err(VariableError::DuplicateId {
                index,
                id: spec.id.clone(),
            });
        }

        let len = spec.description.chars().count();
        if len > MAX_PROMPT_TEXT_LEN {
            return Err(VariableError::PromptTooLong {
                index,
                len,
                max: MAX_PROMPT_TEXT_LEN,
            });
        }

        match spec.kind.as_deref() {
            None | Some("") | Some("string") => {}
            Some(other) => {
                return Err(VariableError::UnsupportedType {
                    index,
                    kind: other.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Lexically normalize a path: drop `.`, fold `name/..` pairs
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.last().copied();
                match last {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => out.push(component),
                }
            }
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Ensure `path` stays inside `root` after normalization
pub fn validate_stored_path(path: &Path, root: &Path) -> Result<()> {
    let cleaned = clean_path(path);
    let root = clean_path(root);

    if cleaned
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        let err = MarvaiError::unsafe_path(path, "contains directory traversal sequences");
        err.log_if_security_critical();
        return Err(err);
    }

    if cleaned == root || !cleaned.starts_with(&root) {
        let err = MarvaiError::unsafe_path(
            path,
            format!("is outside the {} directory", root.display()),
        );
        err.log_if_security_critical();
        return Err(err);
    }

    Ok(())
}

/// Refuse to open a symlink; passes when the backend cannot tell or the file
/// does not exist
pub fn reject_symlink(storage: &dyn Storage, path: &Path) -> Result<()> {
    match storage.link_status(path) {
        Ok(Some(true)) => {
            let err = MarvaiError::unsafe_path(path, "is a symbolic link, refusing to read");
            err.log_if_security_critical();
            Err(err)
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::debug!("Could not determine link status of {:?}: {}", path, e);
            Ok(())
        }
    }
}

/// Check a bare filename picked from a directory listing
pub fn validate_source_filename(name: &str) -> Result<()> {
    if name.contains("..") || name.contains('/') {
        return Err(MarvaiError::unsafe_name(
            name,
            "filename contains path traversal",
        ));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(MarvaiError::unsafe_name(
            name,
            format!("filename too long (max {MAX_FILENAME_LEN} characters)"),
        ));
    }
    Ok(())
}
