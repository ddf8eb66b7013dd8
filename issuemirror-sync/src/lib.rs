//! # issuemirror-sync
//!
//! Reconciles remote issues and pull requests with the documents in the
//! vault.
//!
//! Call [`pipeline::run`] to load the config and run one pass, or drive a
//! [`SyncEngine`] directly with your own [`DocumentStore`] and
//! [`RemoteSource`]. Wrap every pass in a [`SyncGuard`] permit so that at
//! most one runs at a time.

pub mod diff;
pub mod engine;
pub mod error;
pub mod filter;
pub mod frontmatter;
pub mod guard;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod store;

pub use engine::{SyncEngine, SyncOptions};
pub use error::SyncError;
pub use frontmatter::Frontmatter;
pub use guard::{SyncGuard, SyncPermit};
pub use pipeline::SyncScope;
pub use remote::{ItemQuery, RemoteSource};
pub use report::{Notice, NoticeAction, PlannedChange, SyncReport};
pub use store::{DocumentStore, FsStore};
