//! issuemirror core library: domain types, tracking policy, config persistence and errors.
//!
//! Public API surface:
//! - [`types`]: remote item snapshots and identifiers
//! - [`policy`]: per-repository tracking policy and [`EffectivePolicy`] merge
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load / save / add / remove tracked repositories

pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::Config;
pub use error::ConfigError;
pub use policy::{
    AssigneeFilter, AssigneeFilterMode, EffectivePolicy, FolderLayout, GlobalSettings,
    KindPolicy, LabelFilter, LabelFilterMode, NotificationLevel, RepositoryConfig, UpdateMode,
};
pub use types::{
    Comment, CommentKind, Issue, ItemFields, ItemKind, ItemState, PullRequest, RemoteItem, RepoId,
};
