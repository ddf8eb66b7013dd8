//! Error types for issuemirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use issuemirror_core::ConfigError;
use issuemirror_renderer::RenderError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A configuration error (invalid identifier, empty path, missing file).
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote source failed (network, HTTP status, payload shape).
    #[error("remote error: {0}")]
    Remote(String),

    /// Another sync pass holds the guard.
    #[error("a sync pass is already running")]
    Busy,
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
