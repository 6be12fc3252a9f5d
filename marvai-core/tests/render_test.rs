//! Rendering installed prompts and handing them to an AI CLI

mod common;

use anyhow::Result;
use async_trait::async_trait;
use common::{harness, publish, read, REVIEW_V1};
use marvai_core::agent::Invocation;
use marvai_core::{CliTool, CommandRunner, MarvaiError, ScriptedPrompter};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct RecordingRunner {
    runs: Mutex<Vec<Invocation>>,
    fail: bool,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    fn look_path(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    fn is_executable(&self, _path: &Path) -> bool {
        false
    }

    async fn run(&self, invocation: &Invocation, _stdin_timeout: Duration) -> marvai_core::Result<()> {
        self.runs.lock().unwrap().push(invocation.clone());
        if self.fail {
            return Err(MarvaiError::Execution {
                tool: invocation.program.clone(),
                reason: "exit status 1".to_string(),
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_render_simple_substitution() -> Result<()> {
    let h = harness();
    h.storage.insert(
        ".marvai/greet.mprompt",
        "name: greet\n--\n- id: x\n  description: \"X?\"\n--\nSay {{x}}",
    );
    h.storage.insert(".marvai/greet.var", "x: hello\n");

    assert_eq!(h.manager.render("greet")?, "Say hello");
    Ok(())
}

#[tokio::test]
async fn test_render_without_saved_values() -> Result<()> {
    let h = harness();
    h.storage.insert(
        ".marvai/greet.mprompt",
        "--\n- id: x\n  description: \"X?\"\n--\nSay {{x}}!",
    );

    assert_eq!(h.manager.render("greet")?, "Say !");
    Ok(())
}

#[tokio::test]
async fn test_render_does_not_escape_html() -> Result<()> {
    let h = harness();
    h.storage.insert(
        ".marvai/code.mprompt",
        "--\n- id: snippet\n  description: \"Code?\"\n--\nFix: {{snippet}}",
    );
    h.storage
        .insert(".marvai/code.var", "snippet: \"if a < b && c > d {}\"\n");

    assert_eq!(h.manager.render("code")?, "Fix: if a < b && c > d {}");
    Ok(())
}

#[tokio::test]
async fn test_render_errors() {
    let h = harness();

    let err = h.manager.render("missing").unwrap_err();
    assert!(matches!(err, MarvaiError::NotInstalled { .. }));

    let err = h.manager.render("../escape").unwrap_err();
    assert!(matches!(err, MarvaiError::UnsafeName { .. }));

    h.storage.insert(".marvai/broken.mprompt", "--\n--\nHi");
    h.storage.insert(".marvai/broken.var", "- not\n- a map\n");
    let err = h.manager.render("broken").unwrap_err();
    assert!(matches!(err, MarvaiError::InvalidValues { .. }));
}

#[tokio::test]
async fn test_symlinked_files_are_refused() {
    let h = harness();
    h.storage.insert(".marvai/linked.mprompt", "--\n--\nHi");
    h.storage.mark_symlink(".marvai/linked.mprompt");

    let err = h.manager.render("linked").unwrap_err();
    assert!(matches!(err, MarvaiError::UnsafePath { .. }));

    h.storage.insert(".marvai/values.mprompt", "--\n--\nHi");
    h.storage.insert(".marvai/values.var", "x: y\n");
    h.storage.mark_symlink(".marvai/values.var");
    let err = h.manager.render("values").unwrap_err();
    assert!(matches!(err, MarvaiError::UnsafePath { .. }));
}

#[tokio::test]
async fn test_render_when_link_status_is_unavailable() -> Result<()> {
    let h = harness();
    h.storage.insert(".marvai/plain.mprompt", "--\n--\nHi");
    h.storage.disable_link_status();

    assert_eq!(h.manager.render("plain")?, "Hi");
    Ok(())
}

#[tokio::test]
async fn test_execute_pipes_prompt_to_claude() -> Result<()> {
    let h = harness();
    publish(&h.source, "code-review", "1.0.0", REVIEW_V1, None);
    let mut prompter = ScriptedPrompter::new(["rust", "safety"]);
    h.manager.install("code-review", None, &mut prompter).await?;

    let runner = RecordingRunner::default();
    h.manager
        .execute("code-review", CliTool::Claude, &runner)
        .await?;

    let runs = runner.runs.lock().unwrap().clone();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].program, "claude");
    assert!(runs[0].args.is_empty());
    assert_eq!(
        runs[0].stdin.as_deref(),
        Some(&b"Review this rust code. Focus: safety\n/exit\n"[..])
    );

    let log = read(&h.storage, ".marvai/marvai.log").unwrap();
    assert!(log.contains("EXECUTE_PROMPT: code-review - Successfully executed with claude"));
    Ok(())
}

#[tokio::test]
async fn test_execute_failures_are_logged() {
    let h = harness();
    h.storage.insert(".marvai/hi.mprompt", "--\n--\nHi");

    let runner = RecordingRunner {
        fail: true,
        ..Default::default()
    };
    let err = h
        .manager
        .execute("hi", CliTool::Codex, &runner)
        .await
        .unwrap_err();
    assert!(matches!(err, MarvaiError::Execution { .. }));
    assert_eq!(runner.runs.lock().unwrap()[0].args, vec!["Hi".to_string()]);

    let err = h
        .manager
        .execute("absent", CliTool::Gemini, &runner)
        .await
        .unwrap_err();
    assert!(matches!(err, MarvaiError::NotInstalled { .. }));
    assert_eq!(runner.runs.lock().unwrap().len(), 1);

    let log = read(&h.storage, ".marvai/marvai.log").unwrap();
    assert!(log.contains("hi - Execution failed with codex"));
    assert!(log.contains("absent - Execution failed with gemini"));
}
