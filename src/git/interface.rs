//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to the repository's object
//! database. All reads (refs, trees, blobs) and all commits flow through
//! [`Git`], which normalizes git2 errors into typed failure categories.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: No repository at the given path
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//! - [`GitError::ExternalTool`]: A `git` subprocess exited abnormally

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::{CommitRequest, ObjectStore, TreeEntry};
use crate::core::changes::Operation;
use crate::core::types::{BranchName, EntryKind, Oid, RefName, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at the given path.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// The ref moved between the time a transaction pinned it and the
    /// time a new commit tried to replace it.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// A `git` subprocess failed.
    #[error("{command} failed ({status}):\n{stderr}")]
    ExternalTool {
        /// The git subcommand that was run
        command: String,
        /// Exit status description
        status: String,
        /// Captured diagnostic output
        stderr: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

fn from_git2(oid: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(oid.to_string()).map_err(GitError::from)
}

/// The Git interface.
///
/// Wraps a bare repository. Reads are plain object lookups; the only
/// mutations are [`Git::init_bare`] and [`ObjectStore::commit_changes`],
/// and the branch ref is only ever moved with compare-and-swap.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Bootstrap
    // =========================================================================

    /// Open an existing repository at exactly `path` (no discovery).
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self { repo })
    }

    /// Create a bare repository at `path` whose `branch` points at a single
    /// parentless commit with an empty tree.
    pub fn init_bare(
        path: &Path,
        branch: &BranchName,
        committer_email: &str,
    ) -> Result<Self, GitError> {
        let repo = git2::Repository::init_bare(path).map_err(|e| GitError::AccessError {
            message: format!("cannot initialize {}: {}", path.display(), e.message()),
        })?;

        let refname = RefName::for_branch(branch);
        {
            let tree_id = repo
                .treebuilder(None)
                .and_then(|builder| builder.write())
                .map_err(|e| GitError::from_git2(e, "empty tree"))?;
            let tree = repo
                .find_tree(tree_id)
                .map_err(|e| GitError::from_git2(e, &tree_id.to_string()))?;
            let sig = git2::Signature::now(super::DEFAULT_COMMITTER_NAME, committer_email)
                .map_err(|e| GitError::from_git2(e, "signature"))?;
            let commit = repo
                .commit(
                    Some(refname.as_str()),
                    &sig,
                    &sig,
                    super::INITIAL_COMMIT_MESSAGE,
                    &tree,
                    &[],
                )
                .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
            repo.set_head(refname.as_str())
                .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
            info!(path = %path.display(), %branch, commit = %commit, "bootstrapped password store");
        }

        Ok(Self { repo })
    }

    /// Get direct access to the git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        from_git2(oid)
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Move a ref from `expected_old` to `new_oid` atomically.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the ref no longer points at `expected_old`
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: &Oid,
        message: &str,
    ) -> Result<(), GitError> {
        let new = to_git2(new_oid)?;
        let old = to_git2(expected_old)?;

        match self.repo.reference_matching(refname, new, true, old, message) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::Modified => {
                let actual = self
                    .try_resolve_ref(refname)?
                    .map(|oid| oid.to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected_old.to_string(),
                    actual,
                })
            }
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    // =========================================================================
    // Commit Information
    // =========================================================================

    /// Parent commit ids of `oid`.
    pub fn commit_parents(&self, oid: &Oid) -> Result<Vec<Oid>, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        commit.parent_ids().map(from_git2).collect()
    }

    /// Full message of commit `oid`.
    pub fn commit_message(&self, oid: &Oid) -> Result<String, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        Ok(commit.message().unwrap_or_default().to_string())
    }

    /// Committer name and email of commit `oid`.
    pub fn commit_committer(&self, oid: &Oid) -> Result<(String, String), GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let committer = commit.committer();
        Ok((
            committer.name().unwrap_or_default().to_string(),
            committer.email().unwrap_or_default().to_string(),
        ))
    }

    // =========================================================================
    // Commit Creation
    // =========================================================================

    /// Build the new root tree by applying the request's change set to the
    /// parent's tree, then write the commit object. Does not move any ref.
    fn write_commit(&self, request: &CommitRequest<'_>) -> Result<Oid, GitError> {
        let parent = self
            .repo
            .find_commit(to_git2(request.parent)?)
            .map_err(|e| GitError::from_git2(e, request.parent.as_str()))?;
        let base = parent
            .tree()
            .map_err(|e| GitError::from_git2(e, request.parent.as_str()))?;

        let mut builder = git2::build::TreeUpdateBuilder::new();
        for op in request.changes.resolved_operations() {
            match op {
                Operation::Write { path, content } => {
                    let blob = self
                        .repo
                        .blob(&content.to_bytes())
                        .map_err(|e| GitError::from_git2(e, path.as_str()))?;
                    builder.upsert(path.as_str(), blob, git2::FileMode::Blob);
                }
                Operation::Remove { path } => {
                    // Removing an absent path is a no-op, as with `D` in fast-import
                    if base.get_path(Path::new(path.as_str())).is_ok() {
                        builder.remove(path.as_str());
                    }
                }
            }
        }
        let tree_id = builder
            .create_updated(&self.repo, &base)
            .map_err(|e| GitError::from_git2(e, "tree update"))?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(|e| GitError::from_git2(e, &tree_id.to_string()))?;

        let time = git2::Time::new(request.time.timestamp(), request.time.offset_minutes());
        let sig = git2::Signature::new(&request.committer.name, &request.committer.email, &time)
            .map_err(|e| GitError::from_git2(e, "signature"))?;

        let commit = self
            .repo
            .commit(None, &sig, &sig, request.message, &tree, &[&parent])
            .map_err(|e| GitError::from_git2(e, "commit"))?;
        from_git2(commit)
    }
}

impl ObjectStore for Git {
    fn git_dir(&self) -> &Path {
        Git::git_dir(self)
    }

    fn resolve_branch(&self, branch: &BranchName) -> Result<Oid, GitError> {
        self.resolve_ref(RefName::for_branch(branch).as_str())
    }

    fn commit_tree(&self, commit: &Oid) -> Result<Oid, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(commit)?)
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        from_git2(commit.tree_id())
    }

    fn tree_entries(&self, tree: &Oid) -> Result<Vec<TreeEntry>, GitError> {
        let t = self
            .repo
            .find_tree(to_git2(tree)?)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;

        let mut entries = Vec::with_capacity(t.len());
        for entry in t.iter() {
            // Skip entries with non-UTF8 names
            let Some(name) = entry.name() else { continue };
            entries.push(TreeEntry {
                name: name.to_string(),
                oid: from_git2(entry.id())?,
                kind: match entry.kind() {
                    Some(git2::ObjectType::Tree) => EntryKind::Dir,
                    _ => EntryKind::File,
                },
            });
        }
        Ok(entries)
    }

    fn find_entry(&self, tree: &Oid, name: &str) -> Result<Option<TreeEntry>, GitError> {
        let t = self
            .repo
            .find_tree(to_git2(tree)?)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;

        let found = match t.get_name(name) {
            Some(entry) => Some(TreeEntry {
                name: name.to_string(),
                oid: from_git2(entry.id())?,
                kind: match entry.kind() {
                    Some(git2::ObjectType::Tree) => EntryKind::Dir,
                    _ => EntryKind::File,
                },
            }),
            None => None,
        };
        Ok(found)
    }

    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, GitError> {
        let b = self
            .repo
            .find_blob(to_git2(blob)?)
            .map_err(|e| GitError::from_git2(e, blob.as_str()))?;
        Ok(b.content().to_vec())
    }

    fn commit_changes(&self, request: &CommitRequest<'_>) -> Result<Oid, GitError> {
        let commit = self.write_commit(request)?;
        let refname = RefName::for_branch(request.branch);
        self.update_ref_cas(
            refname.as_str(),
            &commit,
            request.parent,
            &format!("gitpass: {}", request.summary()),
        )?;
        debug!(branch = %request.branch, commit = %commit, "moved branch");
        Ok(commit)
    }
}
