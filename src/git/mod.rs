//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. The store layer talks to
//! the repository exclusively through the narrow [`ObjectStore`] trait:
//! resolve a branch, read trees and blobs by id, and materialize a change
//! set as one commit. No other module imports `git2` or spawns `git`.
//!
//! Two implementations exist:
//! - [`Git`] builds trees and commits in-process with libgit2
//! - [`FastImportStore`] reads through [`Git`] but streams commits to
//!   `git fast-import`
//!
//! # Invariants
//!
//! - Branch refs only move with compare-and-swap semantics
//! - A commit's parent is exactly the snapshot its change set was built on
//! - All operations return strong types (Oid, BranchName, RefName)

mod fast_import;
mod interface;

pub use fast_import::{FastImportStore, FastImportWriter};
pub use interface::{Git, GitError};

use std::path::Path;

use crate::core::changes::ChangeSet;
use crate::core::types::{BranchName, EntryKind, Oid};

/// Committer name used when the caller supplies none.
pub const DEFAULT_COMMITTER_NAME: &str = "Pass";

/// Message of the bootstrap commit.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial Commit";

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Bare child name
    pub name: String,
    /// Blob or tree id
    pub oid: Oid,
    pub kind: EntryKind,
}

/// Identity recorded as the commit's author and committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

impl Committer {
    /// Build an identity, stripping characters git does not allow in
    /// names. A blank name becomes [`DEFAULT_COMMITTER_NAME`].
    pub fn new(name: &str, email: &str) -> Self {
        let clean = |s: &str| -> String {
            s.chars()
                .filter(|c| !matches!(c, '<' | '>' | '\n' | '\r' | '\0'))
                .collect::<String>()
                .trim()
                .to_string()
        };
        let name = clean(name);
        Self {
            name: if name.is_empty() {
                DEFAULT_COMMITTER_NAME.to_string()
            } else {
                name
            },
            email: clean(email),
        }
    }
}

/// A commit timestamp with its UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitTime {
    seconds: i64,
    offset_minutes: i32,
}

impl CommitTime {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// Current local time.
    pub fn now() -> Self {
        let now = chrono::Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.seconds
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset_minutes
    }

    /// Offset in git's `+hhmm` form.
    pub fn format_offset(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
    }
}

/// Everything needed to turn a change set into one commit.
#[derive(Debug, Clone)]
pub struct CommitRequest<'a> {
    pub branch: &'a BranchName,
    /// The snapshot the change set was built on; becomes the only parent.
    pub parent: &'a Oid,
    pub committer: &'a Committer,
    pub time: CommitTime,
    pub message: &'a str,
    pub changes: &'a ChangeSet,
}

impl CommitRequest<'_> {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Narrow interface to a git object database.
///
/// Everything the transaction layer needs, and nothing more, so that a
/// different backend can be substituted without touching transactions.
pub trait ObjectStore: Send {
    /// The repository's git directory (used for the commit lock).
    fn git_dir(&self) -> &Path;

    /// Current tip commit of `branch`.
    fn resolve_branch(&self, branch: &BranchName) -> Result<Oid, GitError>;

    /// Root tree id of `commit`.
    fn commit_tree(&self, commit: &Oid) -> Result<Oid, GitError>;

    /// All entries of `tree`, in tree order.
    fn tree_entries(&self, tree: &Oid) -> Result<Vec<TreeEntry>, GitError>;

    /// Look up a single entry of `tree` by name.
    fn find_entry(&self, tree: &Oid, name: &str) -> Result<Option<TreeEntry>, GitError> {
        Ok(self
            .tree_entries(tree)?
            .into_iter()
            .find(|entry| entry.name == name))
    }

    /// Contents of `blob`.
    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, GitError>;

    /// Write one commit applying `request.changes` on top of
    /// `request.parent` and move `request.branch` to it, failing with
    /// [`GitError::CasFailed`] if the branch no longer points at the parent.
    fn commit_changes(&self, request: &CommitRequest<'_>) -> Result<Oid, GitError>;
}
