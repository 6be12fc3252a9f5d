//! Creating a new, empty `.mprompt` file

use std::path::PathBuf;

use crate::artifact::Frontmatter;
use crate::error::{MarvaiError, Result};
use crate::storage::Storage;
use crate::wizard::Prompter;

pub const DEFAULT_VERSION: &str = "1.0";
pub const TEMPLATE_PLACEHOLDER: &str = "Enter your prompt template here";

fn answer(prompter: &mut dyn Prompter, prompt: &str, default: Option<&str>) -> Result<String> {
    let value = prompter
        .ask(prompt, false, default)?
        .map(|a| a.trim().to_string())
        .unwrap_or_default();
    Ok(match (value.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => value,
    })
}

/// Ask for the frontmatter and write `<filename>.mprompt`
///
/// `filename` is given without the extension; passing one is treated as a
/// mistake rather than silently doubled.
pub fn create_scaffold(
    storage: &dyn Storage,
    filename: &str,
    prompter: &mut dyn Prompter,
) -> Result<PathBuf> {
    if filename.ends_with(".mprompt") {
        return Err(MarvaiError::InvalidSource {
            source_ref: filename.to_string(),
            reason: "filename should not include the .mprompt extension".to_string(),
        });
    }
    let path = PathBuf::from(format!("{filename}.mprompt"));
    if storage.exists(&path) {
        return Err(MarvaiError::AlreadyExists(path));
    }

    let frontmatter = Frontmatter {
        name: Some(answer(prompter, "Enter prompt name", None)?),
        description: Some(answer(prompter, "Enter prompt description", None)?),
        author: Some(answer(prompter, "Enter author name", None)?),
        version: Some(answer(prompter, "Enter version", Some(DEFAULT_VERSION))?),
        ..Default::default()
    };

    let yaml = serde_yaml_ng::to_string(&frontmatter).map_err(|e| {
        MarvaiError::Parse(crate::error::ParseError::InvalidFrontmatter {
            label: filename.to_string(),
            reason: e.to_string(),
        })
    })?;
    let content = format!("{yaml}--\n\n--\n{TEMPLATE_PLACEHOLDER}\n");

    storage
        .write(&path, content.as_bytes())
        .map_err(|e| MarvaiError::storage("write", &path, e))?;
    tracing::info!("Created {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact;
    use crate::storage::MemoryStorage;
    use crate::wizard::ScriptedPrompter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_creates_parseable_file() {
        let storage = MemoryStorage::new();
        let mut prompter = ScriptedPrompter::new(["Review", "Reviews code", "ann", ""]);

        let path = create_scaffold(&storage, "review", &mut prompter).unwrap();
        assert_eq!(path, PathBuf::from("review.mprompt"));

        let bytes = storage.contents("review.mprompt").unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.ends_with("--\n\n--\nEnter your prompt template here\n"));

        let parsed = artifact::parse(&bytes, "review").unwrap();
        assert_eq!(parsed.frontmatter.name.as_deref(), Some("Review"));
        assert_eq!(parsed.frontmatter.version.as_deref(), Some("1.0"));
        assert!(parsed.variables.is_empty());
        assert_eq!(parsed.template, TEMPLATE_PLACEHOLDER);
    }

    #[test]
    fn test_rejects_extension_and_existing_files() {
        let storage = MemoryStorage::new();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(matches!(
            create_scaffold(&storage, "x.mprompt", &mut prompter),
            Err(MarvaiError::InvalidSource { .. })
        ));

        storage.insert("x.mprompt", "keep me");
        assert!(matches!(
            create_scaffold(&storage, "x", &mut prompter),
            Err(MarvaiError::AlreadyExists(_))
        ));
        assert_eq!(storage.contents("x.mprompt").unwrap(), b"keep me");
        assert!(prompter.asked().is_empty());
    }
}
