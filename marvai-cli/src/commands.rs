//! Command handlers
//!
//! Each handler prints its own user-facing output; errors bubble up to
//! `main` as `anyhow` errors.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use marvai_core::listing::{list_installed, list_local, remote_status};
use marvai_core::scaffold::create_scaffold;
use marvai_core::{
    CliTool, InstallOutcome, MarvaiConfig, OsCommandRunner, OsStorage, PromptManager,
    SourceFetcher, Storage, UpdateOutcome,
};

use crate::prompter::StdioPrompter;

/// Manager over the working directory and the configured registry
pub fn build_manager() -> Result<PromptManager> {
    let config = MarvaiConfig::load()?;
    let storage = Arc::new(OsStorage::new());
    let source = Arc::new(
        SourceFetcher::new(storage.clone(), config.clone())
            .context("Failed to set up content fetcher")?,
    );
    Ok(PromptManager::new(storage, source, config))
}

pub async fn run_prompt(name: &str, tool: CliTool) -> Result<()> {
    let manager = build_manager()?;
    manager
        .execute(name, tool, &OsCommandRunner)
        .await
        .with_context(|| format!("Failed to run prompt '{name}' with {tool}"))
}

pub async fn install(source: &str, repo: Option<&str>) -> Result<()> {
    let manager = build_manager()?;
    let mut prompter = StdioPrompter::stdio();

    match manager.install(source, repo, &mut prompter).await? {
        InstallOutcome::Installed {
            name,
            path,
            configured,
        } => {
            println!("✓ Installed '{}' to {}", name, path.display());
            if configured {
                println!("  Configuration saved to {}", manager.values_path(&name).display());
            }
        }
        InstallOutcome::AlreadyInstalled {
            name,
            artifact_exists,
            values_exist,
        } => {
            println!("Prompt '{name}' is already installed.");
            if artifact_exists {
                println!("  {}", manager.artifact_path(&name).display());
            }
            if values_exist {
                println!("  {}", manager.values_path(&name).display());
            }
            println!("Use 'marvai update {name}' to get a newer version.");
        }
    }
    Ok(())
}

pub async fn update(name: &str, repo: Option<&str>) -> Result<()> {
    let manager = build_manager()?;
    let mut prompter = StdioPrompter::stdio();

    println!("Checking for updates to prompt '{name}'...");
    match manager.update(name, repo, &mut prompter).await? {
        UpdateOutcome::UpToDate { version } => {
            println!("Prompt '{name}' is already up to date (v{version})");
        }
        UpdateOutcome::Declined { .. } => println!("Update cancelled."),
        UpdateOutcome::Updated {
            to,
            needs_configuration,
            ..
        } => {
            if needs_configuration {
                println!("Prompt '{name}' updated but may need manual configuration.");
            }
            println!("Successfully updated prompt '{name}' to version {to}");
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct RemoteRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub async fn list_remote(repo: Option<&str>, json_output: bool) -> Result<()> {
    let manager = build_manager()?;
    let manifest = manager.manifest(repo).await?;

    if json_output {
        let entries: Vec<serde_json::Value> = manifest
            .entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.name,
                    "version": entry.version(),
                    "author": entry.author,
                    "description": entry.description,
                    "file": entry.file,
                    "local": remote_status(manager.storage(), manager.store_dir(), entry),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if manifest.entries.is_empty() {
        println!("No remote prompts found");
        return Ok(());
    }

    let rows: Vec<RemoteRow> = manifest
        .entries
        .iter()
        .map(|entry| {
            let status = remote_status(manager.storage(), manager.store_dir(), entry);
            RemoteRow {
                name: format!("{}{}", status.marker(), entry.name),
                version: entry.version().to_string(),
                author: entry.author.clone(),
                description: truncate(&entry.description, 50),
            }
        })
        .collect();

    println!("✨ Found {} prompt(s) available:\n", rows.len());
    println!("{}", render_table(&rows));
    println!("\n* installed   + update available");
    Ok(())
}

#[derive(Tabled)]
struct LocalRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn list_local_files(dir: &Path) -> Result<()> {
    let prompts = list_local(&OsStorage::new(), dir)?;
    if prompts.is_empty() {
        println!("No .mprompt files found in {}", dir.display());
        return Ok(());
    }

    let rows: Vec<LocalRow> = prompts
        .into_iter()
        .map(|p| LocalRow {
            file: format!("{}.mprompt", p.name),
            name: p.display_name,
            version: p.version,
            description: truncate(&p.description, 50),
        })
        .collect();

    println!("Found {} .mprompt file(s):\n", rows.len());
    println!("{}", render_table(&rows));
    Ok(())
}

#[derive(Tabled)]
struct InstalledRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Configured")]
    configured: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn list_installed_prompts() -> Result<()> {
    let storage = OsStorage::new();
    let store_dir = Path::new(marvai_core::config::STORE_DIR);
    if !storage.is_dir(store_dir) {
        println!("No .marvai directory found. Run 'install' command to install prompts first.");
        return Ok(());
    }

    let prompts = list_installed(&storage, store_dir)?;
    if prompts.is_empty() {
        println!("No installed prompts found in .marvai directory");
        return Ok(());
    }

    let rows: Vec<InstalledRow> = prompts
        .into_iter()
        .map(|p| InstalledRow {
            name: p.summary.name,
            version: p.summary.version,
            author: p.summary.author,
            configured: if p.configured { "✓" } else { "" }.to_string(),
            description: truncate(&p.summary.description, 50),
        })
        .collect();

    println!("Found {} installed prompt(s):\n", rows.len());
    println!("{}", render_table(&rows));
    Ok(())
}

pub fn create(filename: &str) -> Result<()> {
    let mut prompter = StdioPrompter::stdio();
    println!("Creating new mprompt file: {filename}.mprompt\n");
    let path = create_scaffold(&OsStorage::new(), filename, &mut prompter)?;

    println!("\n✓ Created {} successfully!", path.display());
    println!("You can now edit the file to add your prompt template.");
    println!("To add wizard variables, edit the middle section between the '--' separators.");
    Ok(())
}

pub fn version() {
    println!("marvai version {}", env!("CARGO_PKG_VERSION"));
}

fn render_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{kept}...")
}
