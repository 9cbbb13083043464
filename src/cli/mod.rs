//! cli
//!
//! Command-line interface layer for gitpass.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve configuration and open the store
//! - Delegate to command handlers and format their output
//!
//! The CLI layer is thin. Every read goes through a read transaction and
//! every change through a single write transaction commit.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::store::{PassStore, StoreOptions};

/// Settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Repository directory override.
    pub root: Option<PathBuf>,
    /// Branch override.
    pub branch: Option<String>,
    /// Explicit config file.
    pub config: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Print JSON instead of plain text.
    pub json: bool,
}

impl Context {
    /// Load configuration, applying command-line overrides.
    pub fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => {
                let loaded = Config::load().context("Failed to load config")?;
                for warning in &loaded.warnings {
                    warn!(path = %warning.path.display(), "{}", warning.message);
                }
                loaded.config
            }
        };

        if let Some(root) = &self.root {
            config.store.root = Some(root.clone());
        }
        if let Some(branch) = &self.branch {
            BranchName::new(branch.as_str()).context("Invalid branch name")?;
            config.store.branch = Some(branch.clone());
        }
        debug!(file = ?config.path(), root = %config.root().display(), "resolved configuration");
        Ok(config)
    }

    /// Open (or bootstrap) the configured store.
    pub fn open_store(&self) -> Result<PassStore> {
        let config = self.config()?;
        let root = config.root();
        PassStore::open_with(&root, config.branch(), StoreOptions::from(&config))
            .with_context(|| format!("Failed to open password store at {}", root.display()))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        root: cli.root,
        branch: cli.branch,
        config: cli.config,
        debug: cli.debug,
        json: cli.json,
    };

    commands::dispatch(cli.command, &ctx)
}
