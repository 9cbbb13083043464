//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$GITPASS_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitpass/config.toml`
//! 3. `~/.gitpass/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use gitpass::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! for warning in &result.warnings {
//!     eprintln!("warning: {}", warning.message);
//! }
//! let config = result.config;
//! println!("store at {} on {}", config.root().display(), config.branch());
//! ```

pub mod schema;

pub use schema::{Backend, StoreConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::BranchName;

/// Default committer email.
pub const DEFAULT_COMMITTER_EMAIL: &str = "pass@localhost";

/// Default limit on resolved path depth.
pub const DEFAULT_MAX_PATH_DEPTH: usize = 64;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Resolved configuration.
///
/// Accessors apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreConfig,
    /// Path to the config file (if loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Wrap an already-built store config.
    pub fn new(store: StoreConfig) -> Result<Self, ConfigError> {
        store.validate()?;
        Ok(Self { store, path: None })
    }

    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    /// A missing config file is not an error (defaults are used).
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        if let Ok(path) = std::env::var("GITPASS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_from(&path, warnings);
            }
            warnings.push(ConfigWarning {
                message: "GITPASS_CONFIG points at a missing file, falling back".to_string(),
                path,
            });
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("gitpass/config.toml");
            if path.exists() {
                return Self::load_from(&path, warnings);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".gitpass/config.toml");
            if path.exists() {
                return Self::load_from(&path, warnings);
            }
        }

        Ok(ConfigLoadResult {
            config: Config::default(),
            warnings,
        })
    }

    /// Load configuration from a specific file.
    pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
        Ok(Self::load_from(path, Vec::new())?.config)
    }

    fn load_from(
        path: &Path,
        warnings: Vec<ConfigWarning>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let store: StoreConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        store.validate()?;

        Ok(ConfigLoadResult {
            config: Config {
                store,
                path: Some(path.to_path_buf()),
            },
            warnings,
        })
    }

    /// Path of the file this config was read from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Repository root; defaults to `~/.gitpass/store`.
    pub fn root(&self) -> PathBuf {
        if let Some(root) = &self.store.root {
            return root.clone();
        }
        dirs::home_dir()
            .map(|home| home.join(".gitpass/store"))
            .unwrap_or_else(|| PathBuf::from(".gitpass/store"))
    }

    /// Branch holding the password tree; defaults to `master`.
    pub fn branch(&self) -> BranchName {
        self.store
            .branch
            .as_deref()
            .and_then(|b| BranchName::new(b).ok())
            .unwrap_or_default()
    }

    pub fn committer_email(&self) -> &str {
        self.store
            .committer_email
            .as_deref()
            .unwrap_or(DEFAULT_COMMITTER_EMAIL)
    }

    pub fn verify_reencryption(&self) -> bool {
        self.store.verify_reencryption.unwrap_or(true)
    }

    pub fn max_path_depth(&self) -> usize {
        self.store.max_path_depth.unwrap_or(DEFAULT_MAX_PATH_DEPTH)
    }

    pub fn backend(&self) -> Backend {
        self.store.backend.unwrap_or_default()
    }
}
