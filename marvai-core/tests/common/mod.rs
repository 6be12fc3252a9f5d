//! Shared fixtures for lifecycle tests
#![allow(dead_code)]

use std::sync::Arc;

use marvai_core::{Artifact, Locator, MarvaiConfig, MemorySource, MemoryStorage, PromptManager};

pub const REVIEW_V1: &str = "\
name: code-review
description: Reviews code
author: marvai
version: 1.0.0
--
- id: language
  description: \"Which language?\"
  required: true
- id: focus
  description: \"What to focus on?\"
--
Review this {{language}} code. Focus: {{focus}}
";

pub const REVIEW_V2: &str = "\
name: code-review
description: Reviews code
author: marvai
version: 1.1.0
--
- id: language
  description: \"Which language?\"
  required: true
- id: focus
  description: \"What to focus on?\"
--
Review this {{language}} code carefully. Focus: {{focus}}
";

pub struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub source: Arc<MemorySource>,
    pub manager: PromptManager,
}

pub fn harness() -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let source = Arc::new(MemorySource::new());
    let manager = PromptManager::new(storage.clone(), source.clone(), MarvaiConfig::default());
    Harness {
        storage,
        source,
        manager,
    }
}

pub fn digest_of(raw: &str) -> String {
    let artifact: Artifact = marvai_core::artifact::parse(raw.as_bytes(), "fixture").unwrap();
    artifact.template_digest()
}

/// Publish `raw` as `<name>.mprompt` in the default repository
pub fn publish(source: &MemorySource, name: &str, version: &str, raw: &str, sha256: Option<&str>) {
    let file = format!("{name}.mprompt");
    let mut manifest = format!(
        "name: {name}\ndescription: Reviews code\nauthor: marvai\nversion: {version}\nfile: {file}\n"
    );
    if let Some(sha) = sha256 {
        manifest.push_str(&format!("sha256: {sha}\n"));
    }
    source.insert(
        Locator::Manifest {
            repo: "marvai".to_string(),
        },
        manifest,
    );
    source.insert(
        Locator::Registry {
            repo: "marvai".to_string(),
            file,
        },
        raw,
    );
}

pub fn read(storage: &MemoryStorage, path: &str) -> Option<String> {
    storage
        .contents(path)
        .map(|b| String::from_utf8(b).unwrap())
}
