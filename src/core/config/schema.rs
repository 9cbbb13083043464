//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the branch must be a valid branch name).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Store configuration as written in `config.toml`.
///
/// Every field is optional; accessors on [`super::Config`] apply defaults.
///
/// # Example
///
/// ```toml
/// root = "/srv/passwords"
/// branch = "master"
/// committer_email = "pass@example.com"
/// verify_reencryption = true
/// max_path_depth = 64
/// backend = "libgit2"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Repository location on disk
    pub root: Option<PathBuf>,

    /// Branch holding the password tree
    pub branch: Option<String>,

    /// Email used in the committer identity
    pub committer_email: Option<String>,

    /// Reject commits that change recipients without re-encrypting affected files
    pub verify_reencryption: Option<bool>,

    /// Maximum number of path segments resolved
    pub max_path_depth: Option<usize>,

    /// How commits are materialized
    pub backend: Option<Backend>,
}

impl StoreConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.branch {
            BranchName::new(branch)
                .map_err(|e| ConfigError::InvalidValue(format!("invalid branch: {}", e)))?;
        }

        if let Some(email) = &self.committer_email {
            if email.is_empty() || email.contains(['<', '>', '\n']) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid committer_email '{}'",
                    email
                )));
            }
        }

        if self.max_path_depth == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_path_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Strategy used to turn a pending change set into a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Build trees and the commit in-process with libgit2.
    #[default]
    Libgit2,
    /// Stream the change set to `git fast-import`.
    FastImport,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Libgit2 => write!(f, "libgit2"),
            Backend::FastImport => write!(f, "fast-import"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "libgit2" => Ok(Backend::Libgit2),
            "fast-import" => Ok(Backend::FastImport),
            other => Err(ConfigError::InvalidValue(format!(
                "invalid backend '{}', must be one of: libgit2, fast-import",
                other
            ))),
        }
    }
}
