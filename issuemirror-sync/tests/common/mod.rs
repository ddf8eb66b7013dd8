//! Shared fixtures: an in-memory remote and a vault-backed config.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use issuemirror_core::{
    Comment, Config, Issue, ItemFields, ItemKind, ItemState, RemoteItem, RepoId, RepositoryConfig,
};
use issuemirror_sync::{
    FsStore, ItemQuery, RemoteSource, SyncEngine, SyncError, SyncOptions, SyncReport,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fixed "now" for every pass.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub fn issue(number: u64, title: &str, updated: DateTime<Utc>) -> RemoteItem {
    let mut fields = ItemFields::new(number, title, "octo", updated - Duration::days(1));
    fields.updated_at = updated;
    RemoteItem::from(Issue { fields })
}

pub fn with_labels(mut item: RemoteItem, labels: &[&str]) -> RemoteItem {
    if let RemoteItem::Issue(issue) = &mut item {
        issue.fields.labels = labels.iter().map(|s| s.to_string()).collect();
    }
    item
}

pub fn closed(mut item: RemoteItem, closed_at: DateTime<Utc>, updated: DateTime<Utc>) -> RemoteItem {
    if let RemoteItem::Issue(issue) = &mut item {
        issue.fields.state = ItemState::Closed;
        issue.fields.closed_at = Some(closed_at);
        issue.fields.updated_at = updated;
    }
    item
}

/// In-memory remote keyed by repository identifier.
#[derive(Default)]
pub struct FakeRemote {
    pub user: Option<String>,
    pub items: HashMap<String, Vec<RemoteItem>>,
    pub comments: HashMap<(String, u64), Vec<Comment>>,
    pub failing: HashSet<String>,
}

impl FakeRemote {
    pub fn set(&mut self, repository: &str, items: Vec<RemoteItem>) {
        self.items.insert(repository.to_string(), items);
    }
}

impl RemoteSource for FakeRemote {
    fn current_user(&self) -> Result<String, SyncError> {
        self.user
            .clone()
            .ok_or_else(|| SyncError::Remote("not authenticated".into()))
    }

    fn list_items(
        &self,
        repo: &RepoId,
        kind: ItemKind,
        query: ItemQuery,
    ) -> Result<Vec<RemoteItem>, SyncError> {
        let key = repo.to_string();
        if self.failing.contains(&key) {
            return Err(SyncError::Remote(format!("{key}: 502 Bad Gateway")));
        }
        let items = self.items.get(&key).cloned().unwrap_or_default();
        Ok(items
            .into_iter()
            .filter(|item| item.kind() == kind)
            .filter(|item| match query {
                ItemQuery::Open => item.is_open(),
                ItemQuery::UpdatedSince(cutoff) => item.fields().updated_at >= cutoff,
            })
            .collect())
    }

    fn list_comments(
        &self,
        repo: &RepoId,
        _kind: ItemKind,
        number: u64,
    ) -> Result<Vec<Comment>, SyncError> {
        Ok(self
            .comments
            .get(&(repo.to_string(), number))
            .cloned()
            .unwrap_or_default())
    }
}

pub fn config(vault: &Path, repositories: &[&str]) -> Config {
    let mut config = Config::default();
    config.settings.vault_path = vault.to_path_buf();
    config.settings.date_format = Some("%Y-%m-%d".to_string());
    config.repositories = repositories.iter().map(|r| RepositoryConfig::new(*r)).collect();
    config
}

pub fn pass(config: &Config, remote: &FakeRemote) -> SyncReport {
    pass_with(config, remote, false)
}

pub fn pass_with(config: &Config, remote: &FakeRemote, dry_run: bool) -> SyncReport {
    let store = FsStore::new(&config.settings.vault_path);
    let options = SyncOptions {
        dry_run,
        repository: None,
        now: Some(now()),
    };
    SyncEngine::new(config, &store, remote).run(&options).expect("sync pass")
}

pub fn issue_path(vault: &Path, repository: &str, number: u64) -> std::path::PathBuf {
    let (owner, name) = repository.split_once('/').expect("owner/name");
    vault
        .join("GitHub Issues")
        .join(owner)
        .join(name)
        .join(format!("Issue - {number}.md"))
}
