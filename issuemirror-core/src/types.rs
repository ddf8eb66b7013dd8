//! Domain types for remote issue-tracker items.
//!
//! Remote payloads are validated into these types at the boundary with the
//! remote source; nothing downstream works on untyped maps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A strongly-typed `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    /// Parse an `owner/name` identifier. Each half must be usable as a single
    /// folder name under the vault.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let invalid = || ConfigError::InvalidRepository(raw.to_string());
        let (owner, name) = trimmed.split_once('/').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && part != "."
                && part != ".."
                && !part.contains(['/', '\\'])
                && !part.contains(char::is_whitespace)
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The two kinds of tracked remote items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    PullRequest,
}

impl ItemKind {
    /// All kinds in a stable order.
    pub fn all() -> &'static [ItemKind] {
        &[ItemKind::Issue, ItemKind::PullRequest]
    }

    /// Machine key, written to the document header as `type`.
    pub fn key(&self) -> &'static str {
        match self {
            ItemKind::Issue => "issue",
            ItemKind::PullRequest => "pull_request",
        }
    }

    /// Human-readable name used in notices.
    pub fn display_name(&self) -> &'static str {
        match self {
            ItemKind::Issue => "issue",
            ItemKind::PullRequest => "pull request",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issue" | "issues" => Ok(ItemKind::Issue),
            "pull_request" | "pull-request" | "pr" | "pull" => Ok(ItemKind::PullRequest),
            other => Err(format!("unknown item kind '{other}'")),
        }
    }
}

/// Open/closed state of a remote item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Open => write!(f, "open"),
            ItemState::Closed => write!(f, "closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote items
// ---------------------------------------------------------------------------

/// Fields shared by issues and pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub number: u64,
    pub state: ItemState,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub author: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    /// Number of comments reported by the remote.
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
}

impl ItemFields {
    /// A minimal open item created (and last updated) at `at`.
    pub fn new(number: u64, title: impl Into<String>, author: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            number,
            state: ItemState::Open,
            title: title.into(),
            body: None,
            author: author.into(),
            assignees: Vec::new(),
            labels: Vec::new(),
            created_at: at,
            updated_at: at,
            closed_at: None,
            url: String::new(),
            comments: 0,
            locked: false,
            lock_reason: None,
            milestone: None,
        }
    }
}

/// An issue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// A pull request snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(flatten)]
    pub fields: ItemFields,
    #[serde(default)]
    pub merged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    /// `None` while the remote has not computed mergeability yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub base_branch: String,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub requested_reviewers: Vec<String>,
}

impl PullRequest {
    /// A pull request with no merge information and empty branch names.
    pub fn new(fields: ItemFields) -> Self {
        Self {
            fields,
            merged: false,
            merged_at: None,
            mergeable: None,
            draft: false,
            base_branch: String::new(),
            head_branch: String::new(),
            requested_reviewers: Vec::new(),
        }
    }
}

/// One issue or pull request, fetched once per sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteItem {
    Issue(Issue),
    PullRequest(PullRequest),
}

impl RemoteItem {
    pub fn fields(&self) -> &ItemFields {
        match self {
            RemoteItem::Issue(issue) => &issue.fields,
            RemoteItem::PullRequest(pr) => &pr.fields,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            RemoteItem::Issue(_) => ItemKind::Issue,
            RemoteItem::PullRequest(_) => ItemKind::PullRequest,
        }
    }

    pub fn number(&self) -> u64 {
        self.fields().number
    }

    pub fn is_open(&self) -> bool {
        self.fields().state == ItemState::Open
    }

    pub fn as_pull_request(&self) -> Option<&PullRequest> {
        match self {
            RemoteItem::PullRequest(pr) => Some(pr),
            RemoteItem::Issue(_) => None,
        }
    }
}

impl From<Issue> for RemoteItem {
    fn from(issue: Issue) -> Self {
        RemoteItem::Issue(issue)
    }
}

impl From<PullRequest> for RemoteItem {
    fn from(pr: PullRequest) -> Self {
        RemoteItem::PullRequest(pr)
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Where a comment was posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommentKind {
    #[default]
    General,
    /// An inline review comment, optionally anchored to a file.
    Review {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

/// A single comment in an item's thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub kind: CommentKind,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_parses_owner_and_name() {
        let repo = RepoId::parse("acme/widgets").expect("parse");
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");
    }

    #[test]
    fn repo_id_rejects_malformed_identifiers() {
        for raw in ["", "acme", "/widgets", "acme/", "a/b/c", "ac me/widgets"] {
            let err = RepoId::parse(raw).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidRepository(_)), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn repo_id_rejects_dot_segments() {
        for raw in ["../..", "acme/..", "./widgets", "acme/.", "acme/..\\x"] {
            let err = RepoId::parse(raw).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidRepository(_)), "{raw:?} should be rejected");
        }
        assert_eq!(RepoId::parse("acme/.github").unwrap().name, ".github");
    }

    #[test]
    fn item_kind_round_trips_through_key() {
        for kind in ItemKind::all() {
            assert_eq!(kind.key().parse::<ItemKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn remote_item_serde_is_tagged_by_kind() {
        let at = Utc::now();
        let item = RemoteItem::from(PullRequest::new(ItemFields::new(3, "Add feature", "octo", at)));
        let yaml = serde_yaml::to_string(&item).expect("serialize");
        assert!(yaml.contains("kind: pull_request"));
        let back: RemoteItem = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, item);
        assert_eq!(back.kind(), ItemKind::PullRequest);
    }

    #[test]
    fn item_state_display() {
        assert_eq!(ItemState::Open.to_string(), "open");
        assert_eq!(ItemState::Closed.to_string(), "closed");
    }
}
