//! `issuemirror repo list|add|remove`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use issuemirror_core::{config, EffectivePolicy, ItemKind, RepositoryConfig};

use super::load_config;

/// Manage tracked repositories.
#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// List tracked repositories and where their notes go.
    List,

    /// Start tracking a repository.
    Add(AddArgs),

    /// Stop tracking a repository. Existing notes are left in place.
    Remove {
        /// Repository identifier, `owner/name`.
        repository: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository identifier, `owner/name`.
    pub repository: String,

    /// Also mirror pull requests.
    #[arg(long)]
    pub pull_requests: bool,

    /// Do not mirror issues.
    #[arg(long)]
    pub no_issues: bool,

    /// Put this repository's notes in one folder (relative to the vault)
    /// instead of `<base>/<owner>/<name>`.
    #[arg(long, value_name = "DIR")]
    pub folder: Option<String>,
}

pub fn run(command: RepoCommand) -> Result<()> {
    match command {
        RepoCommand::List => list(),
        RepoCommand::Add(args) => add(args),
        RepoCommand::Remove { repository } => remove(&repository),
    }
}

#[derive(Tabled)]
struct RepoRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "tracks")]
    tracks: String,
    #[tabled(rename = "folder")]
    folder: String,
    #[tabled(rename = "update mode")]
    update_mode: String,
    #[tabled(rename = "delete")]
    allow_delete: String,
}

fn list() -> Result<()> {
    let (_home, cfg) = load_config()?;
    if cfg.repositories.is_empty() {
        println!("No repositories tracked.");
        println!("Run: issuemirror repo add <owner/name>");
        return Ok(());
    }

    let mut rows = Vec::new();
    for repo in &cfg.repositories {
        for kind in ItemKind::all().iter().copied().filter(|k| repo.tracks(*k)) {
            let row = match EffectivePolicy::resolve(&cfg.settings, repo, kind) {
                Ok(policy) => RepoRow {
                    repository: repo.repository.clone(),
                    tracks: kind.display_name().to_string(),
                    folder: policy.folder().display().to_string(),
                    update_mode: policy.update_mode.as_str().to_string(),
                    allow_delete: policy.allow_delete.to_string(),
                },
                Err(err) => RepoRow {
                    repository: repo.repository.clone(),
                    tracks: kind.display_name().to_string(),
                    folder: format!("invalid: {err}"),
                    update_mode: "-".into(),
                    allow_delete: "-".into(),
                },
            };
            rows.push(row);
        }
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("Vault: {}", cfg.settings.vault_path.display());
    Ok(())
}

fn add(args: AddArgs) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let mut repo = RepositoryConfig::new(args.repository.trim());
    repo.track_issues = !args.no_issues;
    repo.track_pull_requests = args.pull_requests;
    if !repo.track_issues && !repo.track_pull_requests {
        anyhow::bail!("nothing to track: pass --pull-requests when using --no-issues");
    }
    if let Some(folder) = args.folder {
        for policy in [&mut repo.issues, &mut repo.pull_requests] {
            policy.use_custom_folder = true;
            policy.custom_folder = folder.clone();
        }
    }

    let cfg = config::add_repository_at(&home, repo)
        .with_context(|| format!("failed to add '{}'", args.repository))?;
    let added = cfg
        .repository(&args.repository)
        .map(|r| r.repository.clone())
        .unwrap_or(args.repository);
    println!("✓ Tracking '{added}'");
    Ok(())
}

fn remove(repository: &str) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    config::remove_repository_at(&home, repository)
        .with_context(|| format!("failed to remove '{repository}'"))?;
    println!("✓ No longer tracking '{repository}' (existing notes were kept)");
    Ok(())
}
