//! Tracking policy: global defaults, per-repository overrides, and the merged
//! [`EffectivePolicy`] the sync engine works from.
//!
//! # Merge precedence
//!
//! - `ignore_global_settings: true`: the repository's own [`KindPolicy`] is
//!   used unmodified.
//! - otherwise every field comes from the global default, except:
//!   - `use_custom_folder` on the repository contributes its folder;
//!   - `use_custom_template` on the repository contributes its template file
//!     and filename template.
//!
//! Tracking switches (`track_issues`, `track_pull_requests`) are always taken
//! from the repository.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ItemKind, RepoId};

pub const DEFAULT_ISSUE_FILENAME: &str = "Issue - {number}";
pub const DEFAULT_PULL_REQUEST_FILENAME: &str = "PR - {number}";
pub const DEFAULT_ISSUES_FOLDER: &str = "GitHub Issues";
pub const DEFAULT_PULL_REQUESTS_FOLDER: &str = "GitHub Pull Requests";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What to do with an existing document when its remote item changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Never touch an existing document.
    #[default]
    None,
    /// Re-render the document, carrying persist blocks forward.
    Update,
    /// Append a status-change fragment to the end of the document.
    Append,
}

impl UpdateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::None => "none",
            UpdateMode::Update => "update",
            UpdateMode::Append => "append",
        }
    }

    /// Parse the header spelling; unknown values yield `None`.
    pub fn from_header(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Some(UpdateMode::None),
            "update" => Some(UpdateMode::Update),
            "append" => Some(UpdateMode::Append),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelFilterMode {
    #[default]
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AssigneeFilterMode {
    #[default]
    AssignedToMe,
    AssignedToSpecific,
    Unassigned,
    AnyAssigned,
}

/// How chatty sync notices are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Errors and deletions only.
    Minimal,
    /// Plus creates, updates and appends.
    #[default]
    Normal,
    /// Everything, including skips and retained documents.
    Verbose,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LabelFilter {
    pub enabled: bool,
    pub mode: LabelFilterMode,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssigneeFilter {
    pub enabled: bool,
    pub mode: AssigneeFilterMode,
    /// Used by [`AssigneeFilterMode::AssignedToSpecific`].
    pub users: Vec<String>,
}

// ---------------------------------------------------------------------------
// Kind policy
// ---------------------------------------------------------------------------

/// Settings for one item kind. Used both as the global default and as a
/// repository's own values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindPolicy {
    pub update_mode: UpdateMode,
    pub allow_delete: bool,
    pub use_custom_folder: bool,
    pub custom_folder: String,
    /// Empty means the kind's built-in filename template.
    pub filename_template: String,
    pub use_custom_template: bool,
    /// Template file, relative to the vault or absolute.
    pub template_file: String,
    pub include_comments: bool,
    pub label_filter: LabelFilter,
    pub assignee_filter: AssigneeFilter,
}

impl Default for KindPolicy {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::None,
            allow_delete: false,
            use_custom_folder: false,
            custom_folder: String::new(),
            filename_template: String::new(),
            use_custom_template: false,
            template_file: String::new(),
            include_comments: true,
            label_filter: LabelFilter::default(),
            assignee_filter: AssigneeFilter::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Global settings & repositories
// ---------------------------------------------------------------------------

/// Settings shared by every tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Root folder of the local document store.
    pub vault_path: PathBuf,
    pub issues_folder: String,
    pub pull_requests_folder: String,
    /// chrono `strftime` format; `None` renders the locale default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    pub retention_days: u32,
    pub sync_on_startup: bool,
    /// Background sync period; `0` disables the timer.
    pub sync_interval_minutes: u64,
    pub notification_level: NotificationLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    pub issues: KindPolicy,
    pub pull_requests: KindPolicy,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::new(),
            issues_folder: DEFAULT_ISSUES_FOLDER.to_string(),
            pull_requests_folder: DEFAULT_PULL_REQUESTS_FOLDER.to_string(),
            date_format: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            sync_on_startup: false,
            sync_interval_minutes: 0,
            notification_level: NotificationLevel::Normal,
            github_token: None,
            issues: KindPolicy::default(),
            pull_requests: KindPolicy::default(),
        }
    }
}

impl GlobalSettings {
    pub fn kind_defaults(&self, kind: ItemKind) -> &KindPolicy {
        match kind {
            ItemKind::Issue => &self.issues,
            ItemKind::PullRequest => &self.pull_requests,
        }
    }

    /// Hierarchical base folder for `kind`.
    pub fn kind_folder(&self, kind: ItemKind) -> &str {
        match kind {
            ItemKind::Issue => &self.issues_folder,
            ItemKind::PullRequest => &self.pull_requests_folder,
        }
    }
}

/// Per-repository tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// `owner/name`.
    pub repository: String,
    #[serde(default = "default_true")]
    pub track_issues: bool,
    #[serde(default)]
    pub track_pull_requests: bool,
    #[serde(default)]
    pub ignore_global_settings: bool,
    #[serde(default)]
    pub issues: KindPolicy,
    #[serde(default)]
    pub pull_requests: KindPolicy,
}

fn default_true() -> bool {
    true
}

impl RepositoryConfig {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            track_issues: true,
            track_pull_requests: false,
            ignore_global_settings: false,
            issues: KindPolicy::default(),
            pull_requests: KindPolicy::default(),
        }
    }

    pub fn tracks(&self, kind: ItemKind) -> bool {
        match kind {
            ItemKind::Issue => self.track_issues,
            ItemKind::PullRequest => self.track_pull_requests,
        }
    }

    pub fn kind_policy(&self, kind: ItemKind) -> &KindPolicy {
        match kind {
            ItemKind::Issue => &self.issues,
            ItemKind::PullRequest => &self.pull_requests,
        }
    }
}

// ---------------------------------------------------------------------------
// Effective policy
// ---------------------------------------------------------------------------

/// Where a repository's documents live, relative to the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderLayout {
    /// `<base>/<owner>/<repo>/`; empty folders are cleaned up after a pass.
    Hierarchical { base: String },
    /// A single flat folder; never removed automatically.
    Custom(String),
}

impl FolderLayout {
    pub fn folder_for(&self, repo: &RepoId) -> PathBuf {
        match self {
            FolderLayout::Hierarchical { base } => {
                Path::new(base).join(&repo.owner).join(&repo.name)
            }
            FolderLayout::Custom(folder) => PathBuf::from(folder),
        }
    }

    pub fn is_hierarchical(&self) -> bool {
        matches!(self, FolderLayout::Hierarchical { .. })
    }
}

/// Per-repository, per-kind settings after merging global defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePolicy {
    pub repo: RepoId,
    pub kind: ItemKind,
    pub layout: FolderLayout,
    pub update_mode: UpdateMode,
    pub allow_delete: bool,
    pub filename_template: String,
    pub template_file: Option<String>,
    pub include_comments: bool,
    pub label_filter: LabelFilter,
    pub assignee_filter: AssigneeFilter,
    pub date_format: Option<String>,
    pub retention_days: u32,
}

impl EffectivePolicy {
    /// Merge `global` and `repo` for `kind`.
    ///
    /// Fails with [`ConfigError::InvalidRepository`] for a malformed
    /// identifier and [`ConfigError::EmptyPath`] when the selected folder is
    /// empty.
    pub fn resolve(
        global: &GlobalSettings,
        repo: &RepositoryConfig,
        kind: ItemKind,
    ) -> Result<Self, ConfigError> {
        let repo_id = RepoId::parse(&repo.repository)?;
        let own = repo.kind_policy(kind);

        let merged = if repo.ignore_global_settings {
            own.clone()
        } else {
            let mut merged = global.kind_defaults(kind).clone();
            if own.use_custom_folder {
                merged.use_custom_folder = true;
                merged.custom_folder = own.custom_folder.clone();
            }
            if own.use_custom_template {
                merged.use_custom_template = true;
                merged.template_file = own.template_file.clone();
                if !own.filename_template.trim().is_empty() {
                    merged.filename_template = own.filename_template.clone();
                }
            }
            merged
        };

        let layout = if merged.use_custom_folder {
            let folder = merged.custom_folder.trim();
            if folder.is_empty() {
                return Err(ConfigError::EmptyPath("custom_folder"));
            }
            FolderLayout::Custom(folder.to_string())
        } else {
            let base = global.kind_folder(kind).trim();
            if base.is_empty() {
                return Err(ConfigError::EmptyPath(match kind {
                    ItemKind::Issue => "issues_folder",
                    ItemKind::PullRequest => "pull_requests_folder",
                }));
            }
            FolderLayout::Hierarchical {
                base: base.to_string(),
            }
        };

        let filename_template = if merged.filename_template.trim().is_empty() {
            match kind {
                ItemKind::Issue => DEFAULT_ISSUE_FILENAME.to_string(),
                ItemKind::PullRequest => DEFAULT_PULL_REQUEST_FILENAME.to_string(),
            }
        } else {
            merged.filename_template.clone()
        };

        let template_file = if merged.use_custom_template && !merged.template_file.trim().is_empty() {
            Some(merged.template_file.trim().to_string())
        } else {
            None
        };

        Ok(Self {
            repo: repo_id,
            kind,
            layout,
            update_mode: merged.update_mode,
            allow_delete: merged.allow_delete,
            filename_template,
            template_file,
            include_comments: merged.include_comments,
            label_filter: merged.label_filter,
            assignee_filter: merged.assignee_filter,
            date_format: global.date_format.clone(),
            retention_days: global.retention_days,
        })
    }

    /// Folder holding this repository's documents, relative to the vault.
    pub fn folder(&self) -> PathBuf {
        self.layout.folder_for(&self.repo)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
