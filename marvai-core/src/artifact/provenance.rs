use serde_yaml_ng::{Mapping, Value};
use std::fmt;

use super::parser::parse;
use super::section_yaml;
use crate::error::ParseError;

/// Where an installed artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Github,
    Distro,
}

impl SourceKind {
    /// Classify an install source string
    pub fn classify(source: &str) -> Self {
        if source.starts_with("https://github.com/") {
            SourceKind::Github
        } else if source.starts_with("https://") {
            SourceKind::Distro
        } else {
            SourceKind::Local
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Github => "github",
            SourceKind::Distro => "distro",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set `source` (and optionally `file`) in the frontmatter of a raw document
///
/// Only the text before the first separator is rewritten; every other
/// frontmatter key survives, and everything from the first `--` line onward
/// is kept byte-for-byte.
pub fn stamp_provenance(
    raw: &str,
    label: &str,
    source: SourceKind,
    file: Option<&str>,
) -> Result<String, ParseError> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let split_at = lines
        .iter()
        .position(|line| line.trim() == "--")
        .unwrap_or(lines.len());

    let invalid = |reason: String| ParseError::InvalidFrontmatter {
        label: label.to_string(),
        reason,
    };

    let head = lines[..split_at].join("\n");
    let mut mapping = if head.trim().is_empty() {
        Mapping::new()
    } else {
        match serde_yaml_ng::from_str::<Value>(&head).map_err(|e| invalid(e.to_string()))? {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => return Err(invalid("frontmatter is not a mapping".to_string())),
        }
    };

    mapping.insert(
        Value::String("source".to_string()),
        Value::String(source.as_str().to_string()),
    );
    if let Some(file) = file {
        mapping.insert(
            Value::String("file".to_string()),
            Value::String(file.to_string()),
        );
    }

    let head = section_yaml(&mapping).map_err(|e| invalid(e.to_string()))?;
    let mut out = head.trim().to_string();
    for line in &lines[split_at..] {
        out.push('\n');
        out.push_str(line);
    }

    // The stamped document must still parse
    parse(out.as_bytes(), label)?;
    Ok(out)
}
