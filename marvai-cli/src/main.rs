//! Marvai - prompt templates for Claude, Gemini and Codex
//!
//! Thin command-line layer over `marvai_core::PromptManager`.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use marvai_core::CliTool;

mod commands;
mod prompter;

/// Log levels
#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// AI CLI that receives the rendered prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToolArg {
    Claude,
    Gemini,
    Codex,
}

impl From<ToolArg> for CliTool {
    fn from(arg: ToolArg) -> Self {
        match arg {
            ToolArg::Claude => CliTool::Claude,
            ToolArg::Gemini => CliTool::Gemini,
            ToolArg::Codex => CliTool::Codex,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "marvai",
    about = "Prompt templates for Claude Code and other AI CLI tools",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// CLI tool to run prompts with
    #[clap(long = "cli", value_enum, default_value = "claude", global = true)]
    tool: ToolArg,

    /// Registry repository to install from (defaults to the configured one)
    #[clap(long, global = true)]
    repo: Option<String>,

    /// Set log level
    #[clap(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Execute a prompt template
    Prompt {
        /// Installed prompt name
        name: String,
    },

    /// Install a prompt from a local file, HTTPS URL, or registry name
    Install {
        source: String,
    },

    /// Update an installed prompt from its registry
    Update {
        name: String,
    },

    /// List available remote prompts
    List {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// List local .mprompt files
    ListLocal {
        /// Directory to scan
        #[clap(default_value = ".")]
        dir: PathBuf,
    },

    /// List installed prompts
    Installed,

    /// Create a new .mprompt file
    Create {
        /// File name without the .mprompt extension
        filename: String,
    },

    /// Show version information
    Version,

    /// `marvai <name>` runs an installed prompt
    #[clap(external_subcommand)]
    External(Vec<String>),
}

/// Initialize tracing on stderr
///
/// `--log-level` sets the baseline; directives from `RUST_LOG` are layered
/// on top of it.
fn initialize_tracing(log_level: &LogLevel) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    if let Ok(env) = std::env::var("RUST_LOG") {
        for directive in env.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => eprintln!("Ignoring invalid RUST_LOG directive '{directive}': {e}"),
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn show_welcome_screen(w: &mut impl Write) -> std::io::Result<()> {
    const CYAN: &str = "\x1b[36m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const BOLD: &str = "\x1b[1m";
    const RESET: &str = "\x1b[0m";
    const WIDTH: usize = 56;

    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let fit = |text: &str| -> String {
        if text.chars().count() > WIDTH {
            let kept: String = text.chars().take(WIDTH - 3).collect();
            format!("{kept}...")
        } else {
            format!("{text:<WIDTH$}")
        }
    };
    let row = |w: &mut dyn Write, text: String| -> std::io::Result<()> {
        writeln!(w, "{CYAN}│{RESET}{text}{CYAN}│{RESET}")
    };

    let border = "─".repeat(WIDTH);
    writeln!(w, "{CYAN}╭{border}╮{RESET}")?;
    row(
        w,
        format!("{BOLD}{GREEN}{}{RESET}", fit(" ✻ Welcome to Marvai!")),
    )?;
    row(w, fit(""))?;
    row(
        w,
        format!(
            "{YELLOW}{}{RESET}",
            fit("   Prompt templates for Claude Code & Gemini")
        ),
    )?;
    row(w, fit(""))?;
    for line in [
        "   Commands:",
        "     marvai install <source>  Install a prompt",
        "     marvai list              List available prompts",
        "     marvai prompt <name>     Execute a prompt",
        "     marvai --cli gemini <cmd>  Use Gemini instead",
    ] {
        row(w, fit(line))?;
    }
    row(w, fit(""))?;
    row(w, fit(&format!("   cwd: {cwd}")))?;
    writeln!(w, "{CYAN}╰{border}╯{RESET}")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level);

    let tool = CliTool::from(cli.tool);
    let repo = cli.repo.as_deref();

    let Some(command) = cli.command else {
        show_welcome_screen(&mut std::io::stderr())?;
        return Ok(());
    };

    match command {
        Command::Prompt { name } => commands::run_prompt(&name, tool).await,
        Command::Install { source } => commands::install(&source, repo).await,
        Command::Update { name } => commands::update(&name, repo).await,
        Command::List { json } => commands::list_remote(repo, json).await,
        Command::ListLocal { dir } => commands::list_local_files(&dir),
        Command::Installed => commands::list_installed_prompts(),
        Command::Create { filename } => commands::create(&filename),
        Command::Version => {
            commands::version();
            Ok(())
        }
        Command::External(args) => match args.as_slice() {
            [name] => commands::run_prompt(name, tool).await,
            _ => bail!("Expected a single prompt name, got: {}", args.join(" ")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("marvai").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.tool, ToolArg::Claude);
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert_eq!(cli.repo, None);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["install", "code-review", "--repo", "team", "--cli", "gemini"]);
        assert_eq!(
            cli.command,
            Some(Command::Install {
                source: "code-review".to_string()
            })
        );
        assert_eq!(cli.repo.as_deref(), Some("team"));
        assert_eq!(CliTool::from(cli.tool), CliTool::Gemini);
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        assert!(Cli::try_parse_from(["marvai", "--cli", "gpt", "version"]).is_err());
    }

    #[test]
    fn test_bare_name_runs_prompt() {
        let cli = parse(&["--cli", "codex", "code-review"]);
        assert_eq!(
            cli.command,
            Some(Command::External(vec!["code-review".to_string()]))
        );
        assert_eq!(cli.tool, ToolArg::Codex);
    }

    #[test]
    fn test_list_commands() {
        assert_eq!(parse(&["list", "--json"]).command, Some(Command::List { json: true }));
        assert_eq!(
            parse(&["list-local"]).command,
            Some(Command::ListLocal {
                dir: PathBuf::from(".")
            })
        );
        assert_eq!(parse(&["installed"]).command, Some(Command::Installed));
    }

    #[test]
    fn test_welcome_screen() {
        let mut out = Vec::new();
        show_welcome_screen(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Welcome to Marvai!"));
        assert!(text.contains("marvai install <source>"));
        assert_eq!(text.lines().count(), 13);
    }
}
