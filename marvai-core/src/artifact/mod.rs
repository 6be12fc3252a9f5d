//! The `.mprompt` artifact
//!
//! A document has three sections separated by `--` lines:
//!
//! ```text
//! name: code-review          ← frontmatter (YAML mapping)
//! version: 1.2.0
//! --
//! - id: language             ← wizard variables (YAML list)
//!   description: "Which language?"
//!   required: true
//! --
//! Review this {{language}} code.   ← template body
//! ```

mod parser;
mod provenance;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use parser::parse;
pub use provenance::{stamp_provenance, SourceKind};

/// Serialize one YAML section of a document
///
/// A multi-line string is emitted as a block scalar, and a `--` line inside
/// it would read back as a section separator. When that happens the section
/// is written as JSON instead, which is valid YAML with every string on a
/// single line.
pub(crate) fn section_yaml<T>(value: &T) -> Result<String, serde_yaml_ng::Error>
where
    T: Serialize + ?Sized,
{
    use serde::ser::Error as _;

    let yaml = serde_yaml_ng::to_string(value)?;
    if !yaml.lines().any(|line| line.trim() == "--") {
        return Ok(yaml);
    }
    let mut json = serde_json::to_string_pretty(value).map_err(serde_yaml_ng::Error::custom)?;
    json.push('\n');
    Ok(json)
}

/// Frontmatter metadata, every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub author: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    /// Filename the artifact was published under
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<String>,

    /// Where the artifact was installed from: local, github or distro
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<String>,
}

/// Accept `version: 1.0` as well as `version: "1.0"`
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_yaml_ng::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(serde::de::Error::custom("expected a string")),
    }
}

impl Frontmatter {
    fn is_empty(&self) -> bool {
        self == &Frontmatter::default()
    }
}

/// One question asked by the wizard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub id: String,

    /// Text shown to the user
    #[serde(default, alias = "question")]
    pub description: String,

    /// Only "string" is supported; absent means string
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub required: bool,
}

/// A parsed `.mprompt` document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    pub frontmatter: Frontmatter,
    pub variables: Vec<VariableSpec>,
    /// Trimmed template body, handed to the renderer untouched
    pub template: String,
}

impl Artifact {
    /// Serialize back into the three-section document format
    pub fn to_mprompt(&self) -> Result<String, serde_yaml_ng::Error> {
        let frontmatter = if self.frontmatter.is_empty() {
            String::new()
        } else {
            section_yaml(&self.frontmatter)?
        };
        let variables = if self.variables.is_empty() {
            String::new()
        } else {
            section_yaml(&self.variables)?
        };
        Ok(format!(
            "{frontmatter}--\n{variables}--\n{}\n",
            self.template
        ))
    }

    /// Hex SHA-256 of the template body; frontmatter is not covered
    pub fn template_digest(&self) -> String {
        hex::encode(Sha256::digest(self.template.as_bytes()))
    }

    /// Compare against a registry checksum (hex, any case, optional
    /// `sha256:` prefix)
    pub fn matches_checksum(&self, expected: &str) -> bool {
        let expected = expected.trim();
        let expected = expected
            .strip_prefix("sha256:")
            .or_else(|| expected.strip_prefix("SHA256:"))
            .unwrap_or(expected);
        self.template_digest().eq_ignore_ascii_case(expected)
    }

    pub fn version(&self) -> &str {
        self.frontmatter.version.as_deref().unwrap_or("")
    }
}
