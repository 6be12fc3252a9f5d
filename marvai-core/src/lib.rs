//! Marvai core library
//!
//! Installs, versions and renders `.mprompt` prompt templates for AI coding
//! assistants. The CLI crate is a thin layer over [`PromptManager`].
//!
//! # Pipeline
//!
//! ```text
//! ContentSource ──► artifact::parse ──► security checks ──► wizard
//!                                                             │
//!        AI CLI ◄── PromptRenderer ◄── ResolvedValues ◄───────┘
//! ```
//!
//! File system, network, terminal and process access all sit behind traits
//! ([`Storage`], [`ContentSource`], [`Prompter`], [`CommandRunner`]) so the
//! whole lifecycle can run in memory under test.

pub mod activity;
pub mod agent;
pub mod artifact;
pub mod config;
pub mod error;
pub mod installer;
pub mod listing;
pub mod registry;
pub mod render;
pub mod scaffold;
pub mod security;
pub mod source;
pub mod storage;
pub mod values;
pub mod version;
pub mod wizard;

pub use agent::{CliTool, CommandRunner, OsCommandRunner};
pub use artifact::{Artifact, Frontmatter, VariableSpec};
pub use config::MarvaiConfig;
pub use error::{MarvaiError, ParseError, Result, VariableError};
pub use installer::{InstallOutcome, PromptManager, UpdateOutcome};
pub use registry::{RegistryEntry, RegistryManifest};
pub use render::PromptRenderer;
pub use source::{ContentSource, Locator, MemorySource, SourceFetcher};
pub use storage::{MemoryStorage, OsStorage, Storage};
pub use values::ResolvedValues;
pub use version::{compare_versions, is_up_to_date, parse_version, SemVer};
pub use wizard::{Prompter, ScriptedPrompter};
