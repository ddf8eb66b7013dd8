//! YAML config file holding global settings and tracked repositories.
//!
//! # Storage layout
//!
//! ```text
//! ~/.issuemirror/
//!   config.yaml   (mode 0600, may contain an access token)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::{GlobalSettings, RepositoryConfig};
use crate::types::RepoId;

pub const CONFIG_VERSION: u32 = 1;

/// Root of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            settings: GlobalSettings::default(),
            repositories: Vec::new(),
        }
    }
}

impl Config {
    /// Find a tracked repository by its `owner/name` identifier
    /// (case-insensitive, like the remote).
    pub fn repository(&self, repository: &str) -> Option<&RepositoryConfig> {
        self.repositories
            .iter()
            .find(|r| r.repository.eq_ignore_ascii_case(repository.trim()))
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.issuemirror/`
pub fn root_dir_at(home: &Path) -> PathBuf {
    home.join(".issuemirror")
}

/// `<home>/.issuemirror/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the config file.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the config to `<home>/.issuemirror/config.yaml`.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    let dir = root_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Create a default config pointing at `vault_path`.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path, vault_path: PathBuf) -> Result<Config, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    if vault_path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath("vault_path"));
    }
    let mut config = Config::default();
    config.settings.vault_path = vault_path;
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init(vault_path: PathBuf) -> Result<Config, ConfigError> {
    init_at(&home()?, vault_path)
}

// ---------------------------------------------------------------------------
// 5. Tracked repositories
// ---------------------------------------------------------------------------

/// Start tracking a repository. The identifier is validated and normalised.
pub fn add_repository_at(
    home: &Path,
    mut repository: RepositoryConfig,
) -> Result<Config, ConfigError> {
    let id = RepoId::parse(&repository.repository)?;
    repository.repository = id.to_string();

    let mut config = load_at(home)?;
    if config.repository(&repository.repository).is_some() {
        return Err(ConfigError::DuplicateRepository(repository.repository));
    }
    config.repositories.push(repository);
    config
        .repositories
        .sort_by(|a, b| a.repository.to_lowercase().cmp(&b.repository.to_lowercase()));
    save_at(home, &config)?;
    Ok(config)
}

/// `add_repository_at` convenience wrapper.
pub fn add_repository(repository: RepositoryConfig) -> Result<Config, ConfigError> {
    add_repository_at(&home()?, repository)
}

/// Stop tracking a repository. Existing documents are left on disk.
pub fn remove_repository_at(home: &Path, repository: &str) -> Result<Config, ConfigError> {
    let mut config = load_at(home)?;
    let before = config.repositories.len();
    config
        .repositories
        .retain(|r| !r.repository.eq_ignore_ascii_case(repository.trim()));
    if config.repositories.len() == before {
        return Err(ConfigError::UnknownRepository(repository.to_string()));
    }
    save_at(home, &config)?;
    Ok(config)
}

/// `remove_repository_at` convenience wrapper.
pub fn remove_repository(repository: &str) -> Result<Config, ConfigError> {
    remove_repository_at(&home()?, repository)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
