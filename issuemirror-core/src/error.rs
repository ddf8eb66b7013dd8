//! Error types for issuemirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.issuemirror/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// A repository identifier is not of the form `owner/name`.
    #[error("invalid repository identifier '{0}'; expected 'owner/name'")]
    InvalidRepository(String),

    /// A repository is already tracked.
    #[error("repository '{0}' is already tracked")]
    DuplicateRepository(String),

    /// A repository is not tracked.
    #[error("repository '{0}' is not tracked")]
    UnknownRepository(String),

    /// A path setting that must be non-empty is empty.
    #[error("required path setting '{0}' is empty")]
    EmptyPath(&'static str),
}
