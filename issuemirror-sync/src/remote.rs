//! The remote issue tracker, as seen by the sync engine.

use chrono::{DateTime, Utc};

use issuemirror_core::{Comment, ItemKind, RemoteItem, RepoId};

use crate::error::SyncError;

/// Which items to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemQuery {
    /// Every open item.
    Open,
    /// Every item (open or closed) updated at or after the cutoff.
    UpdatedSince(DateTime<Utc>),
}

/// Read-only access to a remote tracker.
///
/// Implementations validate remote payloads into [`RemoteItem`] and
/// [`Comment`]; the engine never sees raw responses.
pub trait RemoteSource {
    /// Login of the authenticated user, for the `assigned-to-me` filter.
    fn current_user(&self) -> Result<String, SyncError>;

    fn list_items(
        &self,
        repo: &RepoId,
        kind: ItemKind,
        query: ItemQuery,
    ) -> Result<Vec<RemoteItem>, SyncError>;

    /// General comments plus, for pull requests, review comments.
    fn list_comments(
        &self,
        repo: &RepoId,
        kind: ItemKind,
        number: u64,
    ) -> Result<Vec<Comment>, SyncError>;
}
