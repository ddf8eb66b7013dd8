//! Unified diffs of the changes a dry run planned, for `issuemirror diff`.

use std::path::PathBuf;

use similar::TextDiff;

use crate::report::{PlannedChange, SyncReport};

/// A single planned document change as a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Diff every planned change in `report`. Changes that leave the content
/// identical are omitted.
pub fn unified_diffs(report: &SyncReport) -> Vec<FileDiff> {
    report.changes.iter().filter_map(diff_change).collect()
}

fn diff_change(change: &PlannedChange) -> Option<FileDiff> {
    let before = change.before.as_deref().unwrap_or("");
    let after = change.after.as_deref().unwrap_or("");
    if change.before.is_some() && before == after {
        return None;
    }

    let display = change.path.display().to_string();
    let old_header = match change.before {
        Some(_) => format!("a/{display}"),
        None => "/dev/null".to_string(),
    };
    let new_header = match change.after {
        Some(_) => format!("b/{display}"),
        None => "/dev/null".to_string(),
    };
    let unified = TextDiff::from_lines(before, after)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Some(FileDiff {
        path: change.path.clone(),
        unified_diff: unified,
    })
}
