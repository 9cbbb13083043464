//! core::lock
//!
//! Exclusive commit lock for a password store repository.
//!
//! # Architecture
//!
//! Only one commit may be materialized against a repository at a time.
//! The lock is an OS-level exclusive lock on `<git_dir>/gitpass.lock`, so
//! it serializes writers across threads and across processes sharing the
//! same repository.
//!
//! # Invariants
//!
//! - Lock must be held from the branch-tip check until the ref has moved
//! - Lock is automatically released on drop (RAII pattern)
//! - [`RepoLock::acquire`] blocks until any other holder lets go
//!
//! # Example
//!
//! ```ignore
//! use gitpass::core::lock::RepoLock;
//!
//! let lock = RepoLock::acquire(git_dir)?;
//! // ... check branch tip, write commit, move ref ...
//! drop(lock);
//! ```

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use thiserror::Error;

/// File name of the lock inside the git directory.
pub const LOCK_FILE: &str = "gitpass.lock";

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the repository.
///
/// Released when dropped, including on early returns and panics.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
}

impl RepoLock {
    /// Acquire the lock, waiting for any other holder to release it.
    ///
    /// # Errors
    ///
    /// - [`LockError::CreateFailed`] if the lock file cannot be opened
    /// - [`LockError::AcquireFailed`] if the OS lock call fails
    pub fn acquire(git_dir: &Path) -> Result<Self, LockError> {
        let path = git_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;
        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;
        Ok(Self { file })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        // Nothing useful to do with an unlock error here
        let _ = self.file.unlock();
    }
}
