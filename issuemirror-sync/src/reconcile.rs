//! Reconciliation of one (repository, kind) folder against the remote.
//!
//! ## Open items
//!
//! | existing document | mode     | remote newer | action                      |
//! |-------------------|----------|--------------|-----------------------------|
//! | none              | any      | -            | render + write (created)    |
//! | yes               | `none`   | -            | skipped                     |
//! | yes               | `update` | no           | skipped                     |
//! | yes               | `update` | yes          | render + merge persist + write (updated, or skipped if unchanged) |
//! | yes               | `append` | no           | skipped                     |
//! | yes               | `append` | yes          | append fragment + refresh header (appended) |
//!
//! The mode is the document header's `updateMode`, else the policy's.
//!
//! ## Documents without an open item
//!
//! | history says              | action                                  |
//! |---------------------------|-----------------------------------------|
//! | open (filtered out)       | delete if permitted: no longer tracked  |
//! | closed within retention   | kept                                    |
//! | closed beyond retention   | delete if permitted                     |
//! | not in history            | delete if permitted: removed upstream   |
//!
//! Permission is the header's `allowDelete`, else the policy's. Deletion
//! always moves the document to the trash.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use issuemirror_core::{Comment, EffectivePolicy, ItemKind, RemoteItem, UpdateMode};
use issuemirror_renderer::{
    context::{format_date, iso, yaml_quote},
    document::set_header_value,
    filename, persist, DocumentRenderer, RenderInput,
};

use crate::error::SyncError;
use crate::frontmatter::Frontmatter;
use crate::remote::{ItemQuery, RemoteSource};
use crate::report::{Notice, NoticeAction, PlannedChange, SyncReport};
use crate::store::DocumentStore;

// ---------------------------------------------------------------------------
// Document index
// ---------------------------------------------------------------------------

/// An existing document attributed to an item number.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Vault-relative path.
    pub path: PathBuf,
    pub number: u64,
    pub header: Option<Frontmatter>,
}

impl IndexedDocument {
    fn update_mode(&self, policy: &EffectivePolicy) -> UpdateMode {
        self.header
            .as_ref()
            .and_then(Frontmatter::update_mode)
            .unwrap_or(policy.update_mode)
    }

    fn allow_delete(&self, policy: &EffectivePolicy) -> bool {
        self.header
            .as_ref()
            .and_then(Frontmatter::allow_delete)
            .unwrap_or(policy.allow_delete)
    }

    fn updated(&self) -> Option<String> {
        self.header.as_ref().and_then(Frontmatter::updated)
    }
}

/// Whether the remote `updated_at` is strictly newer than the header's
/// `updated` value.
///
/// RFC 3339 values compare as instants at second precision. Anything else
/// is compared with the item's formatted date: a different string counts as
/// newer. A missing value always counts as newer.
pub fn is_newer(remote: &DateTime<Utc>, header_updated: Option<&str>, date_format: Option<&str>) -> bool {
    let Some(raw) = header_updated.map(str::trim).filter(|s| !s.is_empty()) else {
        return true;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(local) => remote.timestamp() > local.timestamp(),
        Err(_) => format_date(remote, date_format) != raw,
    }
}

// ---------------------------------------------------------------------------
// KindPass
// ---------------------------------------------------------------------------

/// One reconciliation of a (repository, kind) folder.
pub struct KindPass<'a> {
    pub store: &'a dyn DocumentStore,
    pub remote: &'a dyn RemoteSource,
    pub policy: &'a EffectivePolicy,
    pub renderer: &'a DocumentRenderer,
    pub now: DateTime<Utc>,
    pub dry_run: bool,
}

impl<'a> KindPass<'a> {
    /// Reconcile the folder against `open`, the filtered open items.
    pub fn run(&self, open: &[RemoteItem], report: &mut SyncReport) -> Result<(), SyncError> {
        let index = self.index(report)?;
        tracing::debug!(
            "{} {}: {} open item(s), {} indexed document(s)",
            self.policy.repo,
            self.kind(),
            open.len(),
            index.len()
        );

        for item in open {
            self.sync_open_item(item, index.get(&item.number()), report)?;
        }

        let open_numbers: HashSet<u64> = open.iter().map(RemoteItem::number).collect();
        let leftovers: Vec<&IndexedDocument> = index
            .values()
            .filter(|doc| !open_numbers.contains(&doc.number))
            .collect();
        if !leftovers.is_empty() {
            let cutoff = self.retention_cutoff();
            let history = self.remote.list_items(
                &self.policy.repo,
                self.kind(),
                ItemQuery::UpdatedSince(cutoff),
            )?;
            for doc in leftovers {
                let entry = history.iter().find(|item| item.number() == doc.number);
                self.resolve_leftover(doc, entry, cutoff, report)?;
            }
        }
        Ok(())
    }

    fn kind(&self) -> ItemKind {
        self.policy.kind
    }

    /// Oldest close time still inside the retention window. A window
    /// reaching past the representable range keeps everything.
    pub fn retention_cutoff(&self) -> DateTime<Utc> {
        Duration::try_days(i64::from(self.policy.retention_days))
            .and_then(|window| self.now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Attribute every document in the folder to an item number.
    ///
    /// Documents whose header names another repository or kind are skipped.
    /// Documents whose number cannot be recovered are reported and left alone.
    pub fn index(&self, report: &mut SyncReport) -> Result<BTreeMap<u64, IndexedDocument>, SyncError> {
        let repository = self.policy.repo.to_string();
        let mut index: BTreeMap<u64, IndexedDocument> = BTreeMap::new();

        for path in self.store.list_documents(&self.policy.folder())? {
            let header = self.store.read_frontmatter(&path)?;
            if let Some(fm) = &header {
                if fm.repository().is_some_and(|r| !r.trim().eq_ignore_ascii_case(&repository)) {
                    continue;
                }
                if fm.kind().is_some_and(|k| k != self.kind()) {
                    continue;
                }
            }

            let number = header.as_ref().and_then(Frontmatter::number).or_else(|| {
                let name = path.file_name()?.to_str()?;
                filename::extract_number(name, &self.policy.filename_template)
            });
            let Some(number) = number else {
                tracing::warn!("cannot determine item number for {}; leaving it alone", path.display());
                report.push(self.notice(
                    NoticeAction::Ignored,
                    None,
                    Some(&path),
                    "cannot determine item number; left untouched",
                ));
                continue;
            };

            if let Some(first) = index.get(&number) {
                tracing::warn!(
                    "duplicate documents for #{number}: {} and {}; using the first",
                    first.path.display(),
                    path.display()
                );
                report.push(self.notice(
                    NoticeAction::Ignored,
                    Some(number),
                    Some(&path),
                    format!("duplicate of {}", first.path.display()),
                ));
                continue;
            }
            index.insert(number, IndexedDocument { path, number, header });
        }
        Ok(index)
    }

    // -----------------------------------------------------------------------
    // Open items
    // -----------------------------------------------------------------------

    fn sync_open_item(
        &self,
        item: &RemoteItem,
        existing: Option<&IndexedDocument>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let Some(doc) = existing else {
            return self.create(item, report);
        };

        let mode = doc.update_mode(self.policy);
        if mode == UpdateMode::None {
            report.push(self.notice(NoticeAction::Skipped, Some(doc.number), Some(&doc.path), "update mode is none"));
            return Ok(());
        }
        let updated = doc.updated();
        if !is_newer(&item.fields().updated_at, updated.as_deref(), self.policy.date_format.as_deref()) {
            report.push(self.notice(NoticeAction::Skipped, Some(doc.number), Some(&doc.path), "up to date"));
            return Ok(());
        }

        match mode {
            UpdateMode::Append => self.append(item, doc, report),
            _ => self.update(item, doc, mode, report),
        }
    }

    fn create(&self, item: &RemoteItem, report: &mut SyncReport) -> Result<(), SyncError> {
        let comments = self.comments_for(item)?;
        let input = self.input(item, comments.as_deref(), self.policy.update_mode, self.policy.allow_delete);
        let name = filename::render_filename(&self.policy.filename_template, &input.context());
        let path = self.policy.folder().join(name);

        if self.store.exists(&path) {
            tracing::warn!("{} exists but belongs to another item; not overwriting", path.display());
            report.push(self.notice(
                NoticeAction::Skipped,
                Some(item.number()),
                Some(&path),
                "path already holds another document",
            ));
            return Ok(());
        }

        let content = self.renderer.render(&input);
        self.write(&path, None, content, report)?;
        report.push(self.notice(NoticeAction::Created, Some(item.number()), Some(&path), "created"));
        Ok(())
    }

    fn update(
        &self,
        item: &RemoteItem,
        doc: &IndexedDocument,
        mode: UpdateMode,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let old = self.store.read(&doc.path)?;
        let blocks = persist::extract(&old);
        let comments = self.comments_for(item)?;
        let input = self.input(item, comments.as_deref(), mode, doc.allow_delete(self.policy));
        let fresh = self.renderer.render(&input);
        let merged = persist::merge(&fresh, &old, &blocks);

        if merged == old {
            report.push(self.notice(NoticeAction::Skipped, Some(doc.number), Some(&doc.path), "unchanged"));
            return Ok(());
        }
        self.write(&doc.path, Some(old), merged, report)?;
        let message = match blocks.len() {
            0 => "updated".to_string(),
            n => format!("updated, {n} persist block(s) kept"),
        };
        report.push(self.notice(NoticeAction::Updated, Some(doc.number), Some(&doc.path), message));
        Ok(())
    }

    fn append(&self, item: &RemoteItem, doc: &IndexedDocument, report: &mut SyncReport) -> Result<(), SyncError> {
        if doc.header.is_none() {
            report.push(self.notice(
                NoticeAction::Skipped,
                Some(doc.number),
                Some(&doc.path),
                "append needs a document header",
            ));
            return Ok(());
        }
        let old = self.store.read(&doc.path)?;
        let comments = self.comments_for(item)?;
        let input = self.input(item, comments.as_deref(), UpdateMode::Append, doc.allow_delete(self.policy));

        let mut next = old.clone();
        if !next.ends_with('\n') {
            next.push('\n');
        }
        next.push_str(&self.renderer.render_fragment(&input));
        let fields = item.fields();
        let next = set_header_value(&next, "updated", &yaml_quote(&iso(&fields.updated_at)));
        let next = set_header_value(&next, "status", &yaml_quote(&fields.state.to_string()));

        self.write(&doc.path, Some(old), next, report)?;
        report.push(self.notice(NoticeAction::Appended, Some(doc.number), Some(&doc.path), "appended update"));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Leftover documents
    // -----------------------------------------------------------------------

    fn resolve_leftover(
        &self,
        doc: &IndexedDocument,
        history: Option<&RemoteItem>,
        cutoff: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let reason = match history {
            Some(item) if item.is_open() => "no longer tracked".to_string(),
            Some(item) => {
                let fields = item.fields();
                let closed_at = fields.closed_at.unwrap_or(fields.updated_at);
                if closed_at >= cutoff {
                    report.push(self.notice(
                        NoticeAction::Kept,
                        Some(doc.number),
                        Some(&doc.path),
                        "closed within the retention window",
                    ));
                    return Ok(());
                }
                format!("closed more than {} day(s) ago", self.policy.retention_days)
            }
            None => "removed upstream".to_string(),
        };

        if !doc.allow_delete(self.policy) {
            report.push(self.notice(
                NoticeAction::Kept,
                Some(doc.number),
                Some(&doc.path),
                format!("{reason}; deletion not allowed"),
            ));
            return Ok(());
        }

        if self.dry_run {
            let before = self.store.read(&doc.path)?;
            report.changes.push(PlannedChange {
                path: doc.path.clone(),
                before: Some(before),
                after: None,
            });
            report.push(self.notice(
                NoticeAction::Deleted,
                Some(doc.number),
                Some(&doc.path),
                format!("{reason}; would move to trash"),
            ));
            return Ok(());
        }

        let trashed = self.store.trash(&doc.path)?;
        report.push(self.notice(
            NoticeAction::Deleted,
            Some(doc.number),
            Some(&doc.path),
            format!("{reason}; moved to {}", trashed.display()),
        ));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn comments_for(&self, item: &RemoteItem) -> Result<Option<Vec<Comment>>, SyncError> {
        if !self.policy.include_comments {
            return Ok(None);
        }
        if item.kind() == ItemKind::Issue && item.fields().comments == 0 {
            return Ok(Some(Vec::new()));
        }
        self.remote
            .list_comments(&self.policy.repo, self.kind(), item.number())
            .map(Some)
    }

    fn input<'b>(
        &'b self,
        item: &'b RemoteItem,
        comments: Option<&'b [Comment]>,
        update_mode: UpdateMode,
        allow_delete: bool,
    ) -> RenderInput<'b> {
        RenderInput {
            repo: &self.policy.repo,
            item,
            comments,
            date_format: self.policy.date_format.as_deref(),
            update_mode,
            allow_delete,
        }
    }

    fn write(
        &self,
        path: &Path,
        before: Option<String>,
        after: String,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        if self.dry_run {
            report.changes.push(PlannedChange {
                path: path.to_path_buf(),
                before,
                after: Some(after),
            });
            return Ok(());
        }
        self.store.write(path, &after)
    }

    fn notice(
        &self,
        action: NoticeAction,
        number: Option<u64>,
        path: Option<&Path>,
        message: impl Into<String>,
    ) -> Notice {
        Notice {
            action,
            repository: self.policy.repo.to_string(),
            kind: Some(self.kind()),
            number,
            path: path.map(Path::to_path_buf),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
