use super::{Artifact, Frontmatter, VariableSpec};
use crate::error::{ParseError, VariableError};
use crate::security::{self, MAX_CONTENT_SIZE, MAX_SECTION_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Frontmatter,
    Wizard,
    Template,
}

impl Section {
    fn next(self) -> Self {
        match self {
            Section::Frontmatter => Section::Wizard,
            Section::Wizard | Section::Template => Section::Template,
        }
    }
}

fn is_separator(line: &str) -> bool {
    line.trim() == "--"
}

/// Nothing but whitespace and comments, so YAML would yield null
fn is_blank_yaml(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// Parse a `.mprompt` document; `label` names it in error messages
pub fn parse(raw: &[u8], label: &str) -> Result<Artifact, ParseError> {
    if raw.len() > MAX_CONTENT_SIZE {
        return Err(ParseError::ContentTooLarge {
            label: label.to_string(),
            size: raw.len(),
        });
    }

    let text = String::from_utf8_lossy(raw);
    let mut section = Section::Frontmatter;
    let mut frontmatter_lines = Vec::new();
    let mut wizard_lines = Vec::new();
    let mut template_lines = Vec::new();

    for line in text.split('\n') {
        if is_separator(line) {
            section = section.next();
            continue;
        }
        match section {
            Section::Frontmatter => frontmatter_lines.push(line),
            Section::Wizard => wizard_lines.push(line),
            Section::Template => template_lines.push(line),
        }
    }

    let frontmatter = parse_frontmatter(&frontmatter_lines.join("\n"), label)?;
    let variables =
        parse_variables(&wizard_lines.join("\n")).map_err(|source| {
            ParseError::InvalidVariables {
                label: label.to_string(),
                source,
            }
        })?;
    let template = template_lines.join("\n").trim().to_string();

    Ok(Artifact {
        frontmatter,
        variables,
        template,
    })
}

fn parse_frontmatter(yaml: &str, label: &str) -> Result<Frontmatter, ParseError> {
    if yaml.len() > MAX_SECTION_SIZE {
        return Err(ParseError::InvalidFrontmatter {
            label: label.to_string(),
            reason: format!(
                "section too large ({} bytes), maximum allowed is 1MB",
                yaml.len()
            ),
        });
    }
    if is_blank_yaml(yaml) {
        return Ok(Frontmatter::default());
    }
    serde_yaml_ng::from_str(yaml).map_err(|e| ParseError::InvalidFrontmatter {
        label: label.to_string(),
        reason: e.to_string(),
    })
}

fn parse_variables(yaml: &str) -> Result<Vec<VariableSpec>, VariableError> {
    if yaml.len() > MAX_SECTION_SIZE {
        return Err(VariableError::SectionTooLarge { size: yaml.len() });
    }
    if is_blank_yaml(yaml) {
        return Ok(Vec::new());
    }
    let specs: Vec<VariableSpec> =
        serde_yaml_ng::from_str(yaml).map_err(|e| VariableError::Yaml(e.to_string()))?;
    security::validate_variables(&specs)?;
    Ok(specs)
}
