//! `issuemirror sync`: one pass over the tracked repositories.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use issuemirror_core::NotificationLevel;
use issuemirror_sync::{
    pipeline::{self, SyncScope},
    Notice, NoticeAction, SyncReport,
};

use super::load_config;
use crate::github::GithubSource;

/// Arguments for `issuemirror sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only sync this repository (`owner/name`).
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// Show what would change without writing or trashing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the full report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Show every notice, ignoring `notification_level`.
    #[arg(long, short)]
    pub verbose: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (_home, cfg) = load_config()?;
        let remote = GithubSource::from_settings(&cfg.settings);
        let scope = SyncScope::from_option(self.repo.clone());

        let report = pipeline::run_with_config(&cfg, &remote, scope, self.dry_run)
            .context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report JSON")?
            );
        } else {
            let level = if self.verbose {
                NotificationLevel::Verbose
            } else {
                cfg.settings.notification_level
            };
            print_report(&report, level);
        }

        if report.has_errors() {
            anyhow::bail!(
                "sync finished with {} error(s)",
                report.count(NoticeAction::Error)
            );
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport, level: NotificationLevel) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    if report.notices.is_empty() {
        println!("{prefix}✓ nothing to do");
        return;
    }
    for notice in report.visible(level) {
        println!("{prefix}{} {notice}", marker(notice));
    }
    println!("{prefix}✓ {}", report.summary());
}

fn marker(notice: &Notice) -> colored::ColoredString {
    match notice.action {
        NoticeAction::Created => "+".green(),
        NoticeAction::Updated => "~".yellow(),
        NoticeAction::Appended => "»".cyan(),
        NoticeAction::Deleted => "-".red(),
        NoticeAction::Error => "✗".red().bold(),
        NoticeAction::Skipped | NoticeAction::Kept | NoticeAction::Ignored => "·".dimmed(),
    }
}
