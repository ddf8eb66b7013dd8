//! issuemirror: mirror GitHub issues and pull requests into Markdown notes.
//!
//! # Usage
//!
//! ```text
//! issuemirror init <vault>
//! issuemirror repo list
//! issuemirror repo add <owner/name> [--pull-requests] [--no-issues] [--folder <dir>]
//! issuemirror repo remove <owner/name>
//! issuemirror sync [--repo <owner/name>] [--dry-run] [--json] [--verbose]
//! issuemirror diff [--repo <owner/name>]
//! issuemirror daemon start|stop|status|sync
//! ```

mod commands;
mod github;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, diff::DiffArgs, init::InitArgs, repo::RepoCommand, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "issuemirror",
    version,
    about = "Mirror GitHub issues and pull requests into a folder of Markdown notes",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the config file and point it at a vault folder.
    Init(InitArgs),

    /// Manage tracked repositories.
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },

    /// Run one sync pass over the tracked repositories.
    Sync(SyncArgs),

    /// Show unified diffs of what a sync pass would change.
    Diff(DiffArgs),

    /// Run or control the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Repo { command } => commands::repo::run(command),
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
