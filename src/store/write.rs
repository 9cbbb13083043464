//! store::write
//!
//! Write transactions: a read snapshot plus a pending change set that is
//! realized as exactly one commit.
//!
//! # Visibility
//!
//! Pending changes are never visible to the transaction's own reads;
//! `get` after `put` still returns the snapshot contents.
//!
//! # Commit
//!
//! 1. Check that every pending path fits the depth limit and does not
//!    write through an existing file or over an existing directory
//! 2. Optionally verify that every file affected by a recipient change is
//!    re-encrypted in the same change set
//! 3. Take the repository commit lock
//! 4. Check that the branch still points at the pinned snapshot
//! 5. Materialize the change set on top of the snapshot and move the
//!    branch with compare-and-swap
//!
//! Any failure leaves the branch where it was. The transaction is
//! consumed either way; retry with a fresh one.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::read::{collect_affected, PassRead, ReadTx, WalkControl};
use super::{StoreError, StoreOptions};
use crate::core::changes::{ChangeSet, FileChange, Operation};
use crate::core::lock::RepoLock;
use crate::core::types::{Dirent, EntryKind, Oid, PassPath, RecipientList};
use crate::git::{CommitRequest, CommitTime, Committer, GitError};

/// Message used when a commit is given a blank one.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update passwords";

/// A write transaction.
#[derive(Debug)]
pub struct WriteTx<'a> {
    read: ReadTx<'a>,
    changes: ChangeSet,
    options: &'a StoreOptions,
}

impl<'a> WriteTx<'a> {
    pub(crate) fn new(read: ReadTx<'a>, options: &'a StoreOptions) -> Self {
        Self {
            read,
            changes: ChangeSet::new(),
            options,
        }
    }

    /// The snapshot reads go to, and the parent of the eventual commit.
    pub fn snapshot(&self) -> &ReadTx<'a> {
        &self.read
    }

    /// Record new contents for `path`. Empty contents are a valid file.
    pub fn put(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.changes.put(PassPath::new(path), contents.into());
    }

    /// Record removal of `path`.
    pub fn delete(&mut self, path: &str) {
        self.changes.delete(PassPath::new(path));
    }

    /// Record a new recipient list for directory `path`. An empty list
    /// removes the directory's override.
    pub fn set_recipients<I, S>(&mut self, path: &str, recipients: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.changes
            .set_recipients(&PassPath::new(path), RecipientList::new(recipients));
    }

    pub fn pending_files(&self) -> &std::collections::BTreeMap<PassPath, FileChange> {
        self.changes.files()
    }

    /// Pending recipient lists keyed by recipient file path.
    pub fn pending_recipients(&self) -> &std::collections::BTreeMap<PassPath, RecipientList> {
        self.changes.recipients()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Check that the pending records describe a tree git can hold.
    ///
    /// Every path must be within the depth limit. A write may not go
    /// beneath a path that is a file in the snapshot or is itself being
    /// written, and may not replace a directory.
    pub fn check_paths(&self) -> Result<(), StoreError> {
        let max = self.read.max_depth();
        let operations = self.changes.resolved_operations();
        if let Some(op) = operations.iter().find(|op| op.path().depth() > max) {
            return Err(StoreError::PathTooDeep {
                path: op.path().clone(),
                max,
            });
        }

        let written: BTreeSet<&PassPath> = operations
            .iter()
            .filter_map(|op| match op {
                Operation::Write { path, .. } => Some(*path),
                Operation::Remove { .. } => None,
            })
            .collect();
        for path in &written {
            if self.read.entry_kind(path.as_str())? == Some(EntryKind::Dir) {
                return Err(StoreError::InvalidType {
                    path: (*path).clone(),
                    expected: EntryKind::File,
                });
            }
            let mut ancestor = path.parent();
            while let Some(dir) = ancestor.filter(|d| !d.is_root()) {
                if written.contains(&dir)
                    || self.read.entry_kind(dir.as_str())? == Some(EntryKind::File)
                {
                    return Err(StoreError::InvalidType {
                        path: dir,
                        expected: EntryKind::Dir,
                    });
                }
                ancestor = dir.parent();
            }
        }
        Ok(())
    }

    /// Check that each recipient change re-encrypts every file it affects.
    pub fn verify(&self) -> Result<(), StoreError> {
        for recipient_file in self.changes.recipients().keys() {
            let dir = recipient_file.parent().unwrap_or_default();
            let affected = match collect_affected(&self.read, &dir, Some(&self.changes)) {
                Ok(files) => files,
                // A brand-new directory has nothing to re-encrypt
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            let missing: Vec<PassPath> = affected
                .into_iter()
                .filter(|f| !self.changes.touches_file(f))
                .collect();
            if !missing.is_empty() {
                return Err(StoreError::MissingReencryption { dir, files: missing });
            }
        }
        Ok(())
    }

    /// Realize the pending changes as one commit by `user`.
    ///
    /// Returns the new commit id.
    pub fn commit(self, user: &str, message: &str) -> Result<Oid, StoreError> {
        self.check_paths()?;
        if self.options.verify_reencryption {
            self.verify()?;
        }

        let message = if message.trim().is_empty() {
            DEFAULT_COMMIT_MESSAGE
        } else {
            message
        };

        let store = self.read.object_store();
        let branch = self.read.branch();
        let parent = self.read.commit_id();

        let _lock = RepoLock::acquire(store.git_dir())?;

        let tip = store.resolve_branch(branch)?;
        if &tip != parent {
            warn!(%branch, pinned = %parent, tip = %tip, "rejecting commit on stale snapshot");
            return Err(StoreError::Conflict {
                branch: branch.clone(),
                expected: parent.to_string(),
                actual: tip.to_string(),
            });
        }

        let committer = Committer::new(user, &self.options.committer_email);
        let request = CommitRequest {
            branch,
            parent,
            committer: &committer,
            time: CommitTime::now(),
            message,
            changes: &self.changes,
        };

        let commit = store.commit_changes(&request).map_err(|e| match e {
            GitError::CasFailed {
                expected, actual, ..
            } => StoreError::Conflict {
                branch: branch.clone(),
                expected,
                actual,
            },
            other => StoreError::Git(other),
        })?;

        info!(
            %branch,
            commit = %commit,
            files = self.changes.files().len(),
            recipients = self.changes.recipients().len(),
            user = %committer.name,
            "committed"
        );
        Ok(commit)
    }
}

impl PassRead for WriteTx<'_> {
    fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, StoreError> {
        self.read.entry_kind(path)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.read.get(path)
    }

    fn list(&self, path: &str) -> Result<Vec<Dirent>, StoreError> {
        self.read.list(path)
    }

    fn recipients(&self, path: &str) -> Result<RecipientList, StoreError> {
        self.read.recipients(path)
    }

    fn affected_files(&self, path: &str) -> Result<Vec<PassPath>, StoreError> {
        self.read.affected_files(path)
    }

    fn walk(
        &self,
        path: &str,
        visit: &mut dyn FnMut(&Dirent) -> Result<WalkControl, StoreError>,
    ) -> Result<(), StoreError> {
        self.read.walk(path, visit)
    }
}
