//! Error types for issuemirror-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from template rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Filesystem error while loading a user template.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    /// A user template file exists but is empty.
    #[error("template file {path} is empty")]
    EmptyTemplate { path: PathBuf },
}
