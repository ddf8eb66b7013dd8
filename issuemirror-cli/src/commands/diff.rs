//! `issuemirror diff`: unified diffs of what a sync pass would change.

use anyhow::{Context, Result};
use clap::Args;

use issuemirror_sync::{
    diff::unified_diffs,
    pipeline::{self, SyncScope},
    NoticeAction,
};

use super::load_config;
use crate::github::GithubSource;

/// Arguments for `issuemirror diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Only diff this repository (`owner/name`).
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let (_home, cfg) = load_config()?;
        let remote = GithubSource::from_settings(&cfg.settings);

        let report =
            pipeline::run_with_config(&cfg, &remote, SyncScope::from_option(self.repo), true)
                .context("diff failed")?;
        for notice in report.notices.iter().filter(|n| n.action == NoticeAction::Error) {
            eprintln!("error: {notice}");
        }

        let diffs = unified_diffs(&report);
        if diffs.is_empty() {
            println!("No differences.");
        }
        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        if report.has_errors() {
            anyhow::bail!("some repositories could not be diffed");
        }
        Ok(())
    }
}
