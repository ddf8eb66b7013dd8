//! Per-pass outcome: one [`Notice`] per action plus, in dry runs, the
//! planned file contents.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use issuemirror_core::{ItemKind, NotificationLevel};

/// What happened to one document (or repository, for errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeAction {
    Created,
    Updated,
    Appended,
    Skipped,
    Kept,
    Deleted,
    /// A document the engine could not attribute to an item.
    Ignored,
    Error,
}

impl NoticeAction {
    /// Lowest notification level at which this action is shown.
    pub fn min_level(self) -> NotificationLevel {
        match self {
            NoticeAction::Error | NoticeAction::Deleted => NotificationLevel::Minimal,
            NoticeAction::Created | NoticeAction::Updated | NoticeAction::Appended => {
                NotificationLevel::Normal
            }
            NoticeAction::Skipped | NoticeAction::Kept | NoticeAction::Ignored => {
                NotificationLevel::Verbose
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoticeAction::Created => "created",
            NoticeAction::Updated => "updated",
            NoticeAction::Appended => "appended",
            NoticeAction::Skipped => "skipped",
            NoticeAction::Kept => "kept",
            NoticeAction::Deleted => "deleted",
            NoticeAction::Ignored => "ignored",
            NoticeAction::Error => "error",
        }
    }
}

impl fmt::Display for NoticeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing record of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub action: NoticeAction,
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Notice {
    pub fn error(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Notice {
            action: NoticeAction::Error,
            repository: repository.into(),
            kind: None,
            number: None,
            path: None,
            message: message.into(),
        }
    }

    pub fn visible_at(&self, level: NotificationLevel) -> bool {
        level >= self.action.min_level()
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        if let Some(kind) = self.kind {
            write!(f, " {}", kind.display_name())?;
        }
        if let Some(number) = self.number {
            write!(f, " #{number}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A write or deletion captured instead of performed during a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChange {
    /// Vault-relative document path.
    pub path: PathBuf,
    /// Current content; `None` for a new document.
    pub before: Option<String>,
    /// Planned content; `None` for a deletion.
    pub after: Option<String>,
}

/// Everything one sync pass did (or would do).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub notices: Vec<Notice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<PlannedChange>,
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        SyncReport {
            started_at,
            finished_at: None,
            dry_run,
            notices: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        tracing::debug!("[{}] {}", notice.action, notice);
        self.notices.push(notice);
    }

    pub fn count(&self, action: NoticeAction) -> usize {
        self.notices.iter().filter(|n| n.action == action).count()
    }

    /// Documents created, updated or appended to.
    pub fn writes(&self) -> usize {
        self.count(NoticeAction::Created)
            + self.count(NoticeAction::Updated)
            + self.count(NoticeAction::Appended)
    }

    pub fn has_errors(&self) -> bool {
        self.count(NoticeAction::Error) > 0
    }

    /// Notices shown at `level`.
    pub fn visible(&self, level: NotificationLevel) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.visible_at(level))
    }

    /// One-line tally, e.g. `2 created, 1 deleted`. Zero counts are omitted.
    pub fn summary(&self) -> String {
        let order = [
            NoticeAction::Created,
            NoticeAction::Updated,
            NoticeAction::Appended,
            NoticeAction::Deleted,
            NoticeAction::Kept,
            NoticeAction::Skipped,
            NoticeAction::Ignored,
            NoticeAction::Error,
        ];
        let parts: Vec<String> = order
            .iter()
            .filter_map(|action| {
                let n = self.count(*action);
                (n > 0).then(|| format!("{n} {action}"))
            })
            .collect();
        if parts.is_empty() {
            "nothing to do".to_string()
        } else {
            parts.join(", ")
        }
    }
}
