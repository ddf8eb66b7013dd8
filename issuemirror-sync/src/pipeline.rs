//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::path::Path;

use issuemirror_core::{config, Config, ConfigError};

use crate::engine::{SyncEngine, SyncOptions};
use crate::remote::RemoteSource;
use crate::report::SyncReport;
use crate::store::FsStore;
use crate::SyncError;

/// Scope for a sync pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Sync every tracked repository.
    All,
    /// Sync a single repository (`owner/name`).
    Repository(String),
}

impl SyncScope {
    pub fn from_option(repository: Option<String>) -> Self {
        match repository {
            Some(name) => SyncScope::Repository(name),
            None => SyncScope::All,
        }
    }

    fn repository(&self) -> Option<String> {
        match self {
            SyncScope::All => None,
            SyncScope::Repository(name) => Some(name.clone()),
        }
    }
}

/// Load the config under `home` and run one pass against its vault.
///
/// This is the canonical entrypoint for both `issuemirror sync` and the
/// daemon's triggers.
pub fn run(
    home: &Path,
    remote: &dyn RemoteSource,
    scope: SyncScope,
    dry_run: bool,
) -> Result<SyncReport, SyncError> {
    let config = config::load_at(home)?;
    run_with_config(&config, remote, scope, dry_run)
}

/// Run one pass for an already-loaded config.
pub fn run_with_config(
    config: &Config,
    remote: &dyn RemoteSource,
    scope: SyncScope,
    dry_run: bool,
) -> Result<SyncReport, SyncError> {
    if config.settings.vault_path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath("vault_path").into());
    }
    let store = FsStore::new(&config.settings.vault_path);
    let options = SyncOptions {
        dry_run,
        repository: scope.repository(),
        now: None,
    };
    SyncEngine::new(config, &store, remote).run(&options)
}
