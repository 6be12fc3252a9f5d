//! Handing a rendered prompt to an AI CLI (claude, gemini, codex)
//!
//! Binary discovery prefers fixed install locations over `PATH`, and only
//! accepts regular executable files outside world-writable temp directories.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{MarvaiError, Result};
use crate::security::clean_path;

const WORLD_WRITABLE_DIRS: &[&str] = &["/tmp", "/var/tmp", "/dev/shm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliTool {
    Claude,
    Gemini,
    Codex,
}

impl CliTool {
    pub const ALL: [CliTool; 3] = [CliTool::Claude, CliTool::Gemini, CliTool::Codex];

    pub fn as_str(&self) -> &'static str {
        match self {
            CliTool::Claude => "claude",
            CliTool::Gemini => "gemini",
            CliTool::Codex => "codex",
        }
    }

    /// Build the process invocation for `prompt`
    pub fn invocation(&self, program: String, prompt: &str) -> Invocation {
        match self {
            CliTool::Codex => Invocation {
                program,
                args: vec![prompt.to_string()],
                stdin: None,
            },
            CliTool::Claude => {
                let mut input = prompt.as_bytes().to_vec();
                input.extend_from_slice(b"\n/exit\n");
                Invocation {
                    program,
                    args: Vec::new(),
                    stdin: Some(input),
                }
            }
            CliTool::Gemini => Invocation {
                program,
                args: Vec::new(),
                stdin: Some(prompt.as_bytes().to_vec()),
            },
        }
    }
}

impl fmt::Display for CliTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CliTool {
    type Err = MarvaiError;

    fn from_str(s: &str) -> Result<Self> {
        CliTool::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| MarvaiError::UnknownTool(s.to_string()))
    }
}

/// A process to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<Vec<u8>>,
}

/// Process and binary access, swappable in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Resolve `name` through `PATH`
    fn look_path(&self, name: &str) -> Option<PathBuf>;

    /// Regular file with an execute bit (symlinks are followed)
    fn is_executable(&self, path: &Path) -> bool;

    /// Run to completion; the stdin hand-off must finish within `stdin_timeout`
    async fn run(&self, invocation: &Invocation, stdin_timeout: Duration) -> Result<()>;
}

fn is_secure_home(home: &Path) -> bool {
    let home = home.to_string_lossy();
    !(home.is_empty()
        || home == "/"
        || WORLD_WRITABLE_DIRS.iter().any(|dir| home.starts_with(dir)))
}

fn is_valid_binary(runner: &dyn CommandRunner, path: &Path) -> bool {
    if !runner.is_executable(path) {
        return false;
    }
    let cleaned = clean_path(path);
    let cleaned = cleaned.to_string_lossy();
    if cleaned.contains("..") {
        return false;
    }
    !WORLD_WRITABLE_DIRS
        .iter()
        .any(|dir| cleaned.starts_with(&format!("{dir}/")))
}

/// Locate the binary for `tool`, falling back to the bare name
pub fn find_binary(
    tool: CliTool,
    runner: &dyn CommandRunner,
    os: &str,
    home: Option<&Path>,
) -> String {
    let name = tool.as_str();
    let mut candidates: Vec<PathBuf> = Vec::new();
    let secure_home = home.filter(|h| is_secure_home(h));

    if os == "macos" {
        candidates.push(PathBuf::from("/usr/local/bin").join(name));
        candidates.push(PathBuf::from("/opt/homebrew/bin").join(name));
        if tool == CliTool::Claude {
            candidates.push(PathBuf::from("/Applications/Claude.app/Contents/MacOS/claude"));
        }
        if let Some(home) = secure_home {
            candidates.push(home.join(".local").join("bin").join(name));
        }
    } else {
        candidates.push(PathBuf::from("/usr/local/bin").join(name));
        candidates.push(PathBuf::from("/usr/bin").join(name));
        if let Some(home) = secure_home {
            candidates.push(home.join(".local").join("bin").join(name));
            candidates.push(home.join("bin").join(name));
        }
    }

    if let Some(found) = candidates.iter().find(|p| is_valid_binary(runner, p)) {
        tracing::debug!("Using {} binary at {}", name, found.display());
        return found.to_string_lossy().into_owned();
    }

    if let Some(found) = runner.look_path(name) {
        if is_valid_binary(runner, &found) {
            tracing::debug!("Using {} binary from PATH at {}", name, found.display());
            return found.to_string_lossy().into_owned();
        }
        tracing::warn!(
            "Ignoring {} found on PATH at {}: not a trusted location",
            name,
            found.display()
        );
    }

    name.to_string()
}

/// Run `tool` with an already rendered prompt
pub async fn run_prompt(
    runner: &dyn CommandRunner,
    tool: CliTool,
    prompt: &str,
    stdin_timeout: Duration,
) -> Result<()> {
    let home = dirs::home_dir();
    let program = find_binary(tool, runner, std::env::consts::OS, home.as_deref());
    let invocation = tool.invocation(program, prompt);
    tracing::info!("Running {} ({})", tool, invocation.program);
    runner.run(&invocation, stdin_timeout).await
}

/// Real processes via `tokio::process`; output is inherited
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCommandRunner;

#[async_trait]
impl CommandRunner for OsCommandRunner {
    fn look_path(&self, name: &str) -> Option<PathBuf> {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|candidate| self.is_executable(candidate))
    }

    fn is_executable(&self, path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }

    async fn run(&self, invocation: &Invocation, stdin_timeout: Duration) -> Result<()> {
        let execution = |reason: String| MarvaiError::Execution {
            tool: invocation.program.clone(),
            reason,
        };

        let mut command = tokio::process::Command::new(&invocation.program);
        command.args(&invocation.args);
        command.stdin(if invocation.stdin.is_some() {
            std::process::Stdio::piped()
        } else {
            std::process::Stdio::inherit()
        });

        let mut child = command
            .spawn()
            .map_err(|e| execution(format!("failed to start: {e}")))?;

        let mut write_result = Ok(());
        if let (Some(input), Some(mut stdin)) = (invocation.stdin.clone(), child.stdin.take()) {
            let writer = tokio::spawn(async move {
                stdin.write_all(&input).await?;
                stdin.shutdown().await
            });

            match tokio::time::timeout(stdin_timeout, writer).await {
                Ok(Ok(result)) => write_result = result,
                Ok(Err(join_err)) => {
                    write_result = Err(std::io::Error::other(join_err.to_string()))
                }
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(execution(
                        "timeout waiting for stdin write to complete".to_string(),
                    ));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| execution(format!("failed to wait for process: {e}")))?;

        if !status.success() {
            return Err(execution(format!("process exited with {status}")));
        }
        if let Err(e) = write_result {
            return Err(execution(format!("error writing to stdin: {e}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRunner {
        executables: HashSet<PathBuf>,
        on_path: Option<PathBuf>,
        runs: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        fn look_path(&self, _name: &str) -> Option<PathBuf> {
            self.on_path.clone()
        }

        fn is_executable(&self, path: &Path) -> bool {
            self.executables.contains(path)
        }

        async fn run(&self, invocation: &Invocation, _stdin_timeout: Duration) -> Result<()> {
            self.runs.lock().unwrap().push(invocation.clone());
            Ok(())
        }
    }

    fn runner_with(paths: &[&str], on_path: Option<&str>) -> FakeRunner {
        FakeRunner {
            executables: paths.iter().map(PathBuf::from).collect(),
            on_path: on_path.map(PathBuf::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_tool_names() {
        assert_eq!("claude".parse::<CliTool>().unwrap(), CliTool::Claude);
        assert_eq!("codex".parse::<CliTool>().unwrap(), CliTool::Codex);
        assert!(matches!(
            "cursor".parse::<CliTool>(),
            Err(MarvaiError::UnknownTool(name)) if name == "cursor"
        ));
    }

    #[test]
    fn test_secure_locations_win_over_path() {
        let runner = runner_with(
            &["/usr/bin/claude", "/home/dev/bin/claude"],
            Some("/home/dev/bin/claude"),
        );
        assert_eq!(
            find_binary(CliTool::Claude, &runner, "linux", Some(Path::new("/home/dev"))),
            "/usr/bin/claude"
        );
    }

    #[test]
    fn test_home_paths_only_for_trusted_homes() {
        let runner = runner_with(&["/tmp/evil/.local/bin/gemini"], None);
        assert_eq!(
            find_binary(CliTool::Gemini, &runner, "linux", Some(Path::new("/tmp/evil"))),
            "gemini"
        );

        let runner = runner_with(&["/home/dev/.local/bin/gemini"], None);
        assert_eq!(
            find_binary(CliTool::Gemini, &runner, "linux", Some(Path::new("/home/dev"))),
            "/home/dev/.local/bin/gemini"
        );
        assert_eq!(
            find_binary(CliTool::Gemini, &runner, "linux", Some(Path::new("/"))),
            "gemini"
        );
    }

    #[test]
    fn test_macos_claude_app() {
        let runner = runner_with(&["/Applications/Claude.app/Contents/MacOS/claude"], None);
        assert_eq!(
            find_binary(CliTool::Claude, &runner, "macos", None),
            "/Applications/Claude.app/Contents/MacOS/claude"
        );
        assert_eq!(
            find_binary(CliTool::Claude, &runner, "linux", None),
            "claude"
        );
    }

    #[test]
    fn test_path_results_in_temp_dirs_are_ignored() {
        let runner = runner_with(&["/dev/shm/codex"], Some("/dev/shm/codex"));
        assert_eq!(find_binary(CliTool::Codex, &runner, "linux", None), "codex");

        let runner = runner_with(&["/opt/tools/codex"], Some("/opt/tools/codex"));
        assert_eq!(
            find_binary(CliTool::Codex, &runner, "linux", None),
            "/opt/tools/codex"
        );
    }

    #[test]
    fn test_invocations_per_tool() {
        let codex = CliTool::Codex.invocation("codex".into(), "do it");
        assert_eq!(codex.args, vec!["do it".to_string()]);
        assert_eq!(codex.stdin, None);

        let claude = CliTool::Claude.invocation("claude".into(), "do it");
        assert!(claude.args.is_empty());
        assert_eq!(claude.stdin.as_deref(), Some(&b"do it\n/exit\n"[..]));

        let gemini = CliTool::Gemini.invocation("gemini".into(), "do it");
        assert_eq!(gemini.stdin.as_deref(), Some(&b"do it"[..]));
    }

    #[tokio::test]
    async fn test_run_prompt_uses_runner() {
        let runner = runner_with(&[], None);
        run_prompt(&runner, CliTool::Gemini, "hello", Duration::from_secs(10))
            .await
            .unwrap();

        let runs = runner.runs.lock().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].stdin.as_deref(), Some(&b"hello"[..]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_os_runner_pipes_stdin() {
        let runner = OsCommandRunner;
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "read line; test \"$line\" = hello".to_string()],
            stdin: Some(b"hello\n".to_vec()),
        };
        runner
            .run(&invocation, Duration::from_secs(10))
            .await
            .unwrap();

        let failing = Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            stdin: None,
        };
        assert!(matches!(
            runner.run(&failing, Duration::from_secs(10)).await,
            Err(MarvaiError::Execution { .. })
        ));
    }
}
