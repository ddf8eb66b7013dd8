//! `issuemirror daemon`: run the background syncer or talk to it.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;

use issuemirror_daemon::paths::socket_path;
use issuemirror_daemon::{
    init_tracing, request_status, request_stop, request_sync, start_blocking, DaemonError,
    SharedRemote,
};

use super::load_config;
use crate::github::GithubSource;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (startup/interval syncs + socket server).
    Start {
        /// Log as JSON lines instead of human-readable text.
        #[arg(long)]
        json_logs: bool,
    },
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Ask the running daemon to sync now and wait for the result.
    Sync {
        /// Only sync this repository (`owner/name`).
        #[arg(long, value_name = "OWNER/NAME")]
        repo: Option<String>,
    },
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start { json_logs } => {
            let (_, cfg) = load_config()?;
            let remote: SharedRemote = Arc::new(GithubSource::from_settings(&cfg.settings));
            init_tracing(json_logs);
            start_blocking(&home, remote).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let status = match request_status(&home) {
                Ok(status) => {
                    let mut value = serde_json::to_value(&status)
                        .context("failed to render daemon status JSON")?;
                    value["running"] = serde_json::Value::Bool(true);
                    value
                }
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&status)
                    .context("failed to render daemon status JSON")?
            );
        }
        DaemonCommand::Sync { repo } => match request_sync(&home, repo) {
            Ok(summary) => println!(
                "{}",
                serde_json::to_string_pretty(&summary)
                    .context("failed to render sync summary JSON")?
            ),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                anyhow::bail!("daemon is not running; start it with `issuemirror daemon start`")
            }
            Err(err) => return Err(err).context("daemon sync failed"),
        },
    }

    Ok(())
}
