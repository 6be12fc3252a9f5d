//! Full install/render cycle against a real directory

mod common;

use anyhow::Result;
use common::{publish, REVIEW_V1};
use marvai_core::listing::list_installed;
use marvai_core::{
    InstallOutcome, MarvaiConfig, MarvaiError, MemorySource, OsStorage, PromptManager,
    ScriptedPrompter,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn manager(dir: &TempDir, source: Arc<MemorySource>) -> PromptManager {
    let storage = Arc::new(OsStorage::with_root(dir.path()));
    PromptManager::new(storage, source, MarvaiConfig::default())
}

#[tokio::test]
async fn test_install_and_render_on_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = Arc::new(MemorySource::new());
    publish(&source, "code-review", "1.0.0", REVIEW_V1, None);
    let manager = manager(&temp_dir, source);

    let mut prompter = ScriptedPrompter::new(["rust", "tests"]);
    let outcome = manager.install("code-review", None, &mut prompter).await?;
    assert!(matches!(outcome, InstallOutcome::Installed { configured: true, .. }));

    let store = temp_dir.path().join(".marvai");
    assert!(store.join("code-review.mprompt").is_file());
    assert!(store.join("code-review.var").is_file());
    assert!(store.join("marvai.log").is_file());

    assert_eq!(
        manager.render("code-review")?,
        "Review this rust code. Focus: tests"
    );

    let installed = list_installed(manager.storage(), Path::new(".marvai"))?;
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].summary.name, "code-review");
    assert_eq!(installed[0].summary.version, "1.0.0");
    assert!(installed[0].configured);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_values_file_is_refused() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = Arc::new(MemorySource::new());
    publish(&source, "code-review", "1.0.0", REVIEW_V1, None);
    let manager = manager(&temp_dir, source);

    let mut prompter = ScriptedPrompter::new(["rust", "tests"]);
    manager.install("code-review", None, &mut prompter).await?;

    let outside = temp_dir.path().join("secrets.txt");
    std::fs::write(&outside, "language: stolen\n")?;
    let var_path = temp_dir.path().join(".marvai/code-review.var");
    std::fs::remove_file(&var_path)?;
    std::os::unix::fs::symlink(&outside, &var_path)?;

    let err = manager.render("code-review").unwrap_err();
    assert!(matches!(err, MarvaiError::UnsafePath { .. }));
    Ok(())
}
