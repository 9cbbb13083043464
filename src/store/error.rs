use std::path::PathBuf;

use thiserror::Error;

use crate::core::lock::LockError;
use crate::core::types::{BranchName, EntryKind, PassPath};
use crate::git::GitError;

/// Errors from store operations.
///
/// `NotFound` and `InvalidType` are expected outcomes of reads against a
/// snapshot; everything else is an unexpected failure. Use
/// [`StoreError::is_not_found`] and [`StoreError::is_invalid_type`] to tell
/// them apart.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path does not exist in the snapshot.
    #[error("not found: /{path}")]
    NotFound { path: PassPath },

    /// The path exists but is the wrong kind of entry.
    #[error("/{path} is not a {expected}")]
    InvalidType { path: PassPath, expected: EntryKind },

    /// The path has more segments than the configured limit.
    #[error("path has more than {max} segments: /{path}")]
    PathTooDeep { path: PassPath, max: usize },

    /// The branch moved after the transaction pinned its snapshot.
    #[error("branch {branch} moved from {expected} to {actual}; retry with a new transaction")]
    Conflict {
        branch: BranchName,
        expected: String,
        actual: String,
    },

    /// A recipient change would leave files encrypted to the old recipients.
    #[error("recipients of /{dir} changed but {} affected file(s) were not re-encrypted: {}", .files.len(), join_paths(.files))]
    MissingReencryption { dir: PassPath, files: Vec<PassPath> },

    /// Failed to create or open the repository directory.
    #[error("repository i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Git(#[from] GitError),
}

fn join_paths(paths: &[PassPath]) -> String {
    paths
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_invalid_type(&self) -> bool {
        matches!(self, StoreError::InvalidType { .. })
    }

    /// Whether the caller should retry on a fresh write transaction.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
