pub mod daemon;
pub mod diff;
pub mod init;
pub mod repo;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use issuemirror_core::{config, Config};

/// Home directory and loaded config, with the hint every command shares.
pub(crate) fn load_config() -> Result<(PathBuf, Config)> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config =
        config::load_at(&home).context("failed to load config; run `issuemirror init <vault>` first")?;
    Ok((home, config))
}
