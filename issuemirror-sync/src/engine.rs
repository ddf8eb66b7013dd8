//! A full sync pass over every configured repository.
//!
//! Repositories are processed sequentially. A failure in one repository
//! (invalid identifier, empty folder setting, remote or write error) is
//! logged, recorded as an error notice, and the pass moves on.
//!
//! After all repositories, the empty `<base>/<owner>/<repo>` folders of the
//! repositories this pass processed are removed, then their `<base>/<owner>`
//! parents if those are empty too. Custom folders are never removed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use issuemirror_core::{
    AssigneeFilterMode, Config, ConfigError, EffectivePolicy, ItemKind, RepositoryConfig,
};
use issuemirror_renderer::DocumentRenderer;

use crate::error::SyncError;
use crate::filter;
use crate::reconcile::KindPass;
use crate::remote::{ItemQuery, RemoteSource};
use crate::report::{Notice, SyncReport};
use crate::store::DocumentStore;

/// Knobs for one pass.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Plan only; capture contents instead of writing.
    pub dry_run: bool,
    /// Restrict the pass to one repository (`owner/name`).
    pub repository: Option<String>,
    /// Clock override for retention decisions.
    pub now: Option<DateTime<Utc>>,
}

/// Runs sync passes for one config against one store and remote.
pub struct SyncEngine<'a> {
    config: &'a Config,
    store: &'a dyn DocumentStore,
    remote: &'a dyn RemoteSource,
}

impl<'a> SyncEngine<'a> {
    pub fn new(config: &'a Config, store: &'a dyn DocumentStore, remote: &'a dyn RemoteSource) -> Self {
        SyncEngine { config, store, remote }
    }

    /// Run one pass.
    ///
    /// Fails only when `options.repository` names an untracked repository;
    /// every other failure is recorded in the report.
    pub fn run(&self, options: &SyncOptions) -> Result<SyncReport, SyncError> {
        let now = options.now.unwrap_or_else(Utc::now);
        let repositories: Vec<&RepositoryConfig> = match &options.repository {
            Some(name) => vec![self
                .config
                .repository(name)
                .ok_or_else(|| ConfigError::UnknownRepository(name.clone()))?],
            None => self.config.repositories.iter().collect(),
        };

        tracing::info!(
            "sync pass started: {} repositor{}{}",
            repositories.len(),
            if repositories.len() == 1 { "y" } else { "ies" },
            if options.dry_run { " (dry run)" } else { "" }
        );

        let mut pass = Pass {
            report: SyncReport::new(now, options.dry_run),
            current_user: None,
            cleanup_folders: BTreeSet::new(),
        };
        for repo in repositories {
            if let Err(e) = self.sync_repository(repo, now, options.dry_run, &mut pass) {
                tracing::error!("sync failed for {}: {e}", repo.repository);
                pass.report.push(Notice::error(repo.repository.clone(), e.to_string()));
            }
        }

        if !options.dry_run {
            if let Err(e) = self.cleanup(&pass.cleanup_folders) {
                tracing::warn!("folder cleanup failed: {e}");
            }
        }

        let mut report = pass.report;
        report.finished_at = Some(Utc::now());
        tracing::info!("sync pass finished: {}", report.summary());
        Ok(report)
    }

    fn sync_repository(
        &self,
        repo: &RepositoryConfig,
        now: DateTime<Utc>,
        dry_run: bool,
        pass: &mut Pass,
    ) -> Result<(), SyncError> {
        for kind in ItemKind::all().iter().copied().filter(|k| repo.tracks(*k)) {
            let policy = EffectivePolicy::resolve(&self.config.settings, repo, kind)?;
            if policy.layout.is_hierarchical() {
                pass.cleanup_folders.insert(policy.folder());
            }
            let renderer = self.renderer_for(&policy);

            let open = self.remote.list_items(&policy.repo, kind, ItemQuery::Open)?;
            let fetched = open.len();
            let me = if policy.assignee_filter.enabled
                && policy.assignee_filter.mode == AssigneeFilterMode::AssignedToMe
            {
                pass.current_user(self.remote)
            } else {
                None
            };
            let open = filter::apply(open, &policy.label_filter, &policy.assignee_filter, me.as_deref());
            tracing::debug!(
                "{} {}: {} of {} open item(s) pass the filters",
                policy.repo,
                kind,
                open.len(),
                fetched
            );

            KindPass {
                store: self.store,
                remote: self.remote,
                policy: &policy,
                renderer: &renderer,
                now,
                dry_run,
            }
            .run(&open, &mut pass.report)?;
        }
        Ok(())
    }

    /// The user template for `policy`, or the built-in one when none is set
    /// or it cannot be loaded.
    fn renderer_for(&self, policy: &EffectivePolicy) -> DocumentRenderer {
        let Some(file) = &policy.template_file else {
            return DocumentRenderer::builtin(policy.kind);
        };
        let path = Path::new(file);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.settings.vault_path.join(path)
        };
        match DocumentRenderer::load(policy.kind, Some(&path)) {
            Ok(renderer) => renderer,
            Err(e) => {
                tracing::warn!("{}: {e}; using the built-in template", policy.repo);
                DocumentRenderer::builtin(policy.kind)
            }
        }
    }

    /// Remove empty repository folders, then owner folders left empty.
    fn cleanup(&self, folders: &BTreeSet<PathBuf>) -> Result<(), SyncError> {
        let mut owners = BTreeSet::new();
        for folder in folders {
            self.store.remove_dir_if_empty(folder)?;
            if let Some(owner) = folder.parent() {
                owners.insert(owner.to_path_buf());
            }
        }
        for owner in &owners {
            self.store.remove_dir_if_empty(owner)?;
        }
        Ok(())
    }
}

/// State shared across the repositories of one pass.
struct Pass {
    report: SyncReport,
    /// Looked up at most once per pass; `Some(None)` after a failed lookup.
    current_user: Option<Option<String>>,
    /// Hierarchical `<base>/<owner>/<repo>` folders touched by this pass.
    cleanup_folders: BTreeSet<PathBuf>,
}

impl Pass {
    fn current_user(&mut self, remote: &dyn RemoteSource) -> Option<String> {
        self.current_user
            .get_or_insert_with(|| match remote.current_user() {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("cannot resolve current user for assigned-to-me filter: {e}");
                    None
                }
            })
            .clone()
    }
}
