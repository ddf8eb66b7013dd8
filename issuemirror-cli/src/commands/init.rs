//! `issuemirror init <vault>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use issuemirror_core::config;

/// Create the config file and point it at a vault folder.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Folder that receives the generated notes. Created if missing.
    pub vault: PathBuf,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        std::fs::create_dir_all(&self.vault)
            .with_context(|| format!("cannot create vault folder '{}'", self.vault.display()))?;
        let vault = self
            .vault
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.vault.display()))?;

        let existed = config::config_path_at(&home).exists();
        let cfg = config::init_at(&home, vault).context("failed to create config")?;

        if existed {
            println!(
                "Config already exists; vault is {}",
                cfg.settings.vault_path.display()
            );
        } else {
            println!("✓ Vault set to {}", cfg.settings.vault_path.display());
        }
        println!("  Config: {}", config::config_path_at(&home).display());
        println!("  Next: issuemirror repo add <owner/name>");
        Ok(())
    }
}
