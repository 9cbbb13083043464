//! store
//!
//! The git-backed transactional password store.
//!
//! # Modules
//!
//! - [`read`] - Snapshot reads and the [`PassRead`] trait
//! - [`write`] - Write transactions and commit
//!
//! # Example
//!
//! ```no_run
//! use gitpass::core::types::BranchName;
//! use gitpass::store::{PassRead, PassStore};
//! use std::path::Path;
//!
//! let store = PassStore::open(Path::new("/srv/pass"), BranchName::default())?;
//!
//! let mut tx = store.begin_w()?;
//! tx.set_recipients("team", ["KEYA"]);
//! tx.put("team/db.gpg", b"...ciphertext...".to_vec());
//! tx.commit("alice", "Add db password")?;
//!
//! let tx = store.begin()?;
//! assert_eq!(tx.recipients("team/db.gpg")?.as_slice(), ["KEYA"]);
//! # Ok::<(), gitpass::store::StoreError>(())
//! ```

mod error;
pub mod read;
pub mod write;

pub use error::StoreError;
pub use read::{PassRead, ReadTx, WalkControl};
pub use write::{WriteTx, DEFAULT_COMMIT_MESSAGE};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::config::{Backend, Config, DEFAULT_COMMITTER_EMAIL, DEFAULT_MAX_PATH_DEPTH};
use crate::core::types::BranchName;
use crate::git::{FastImportStore, Git, ObjectStore};

/// Behaviour knobs for a store handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub committer_email: String,
    pub verify_reencryption: bool,
    pub max_path_depth: usize,
    pub backend: Backend,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            committer_email: DEFAULT_COMMITTER_EMAIL.to_string(),
            verify_reencryption: true,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            backend: Backend::default(),
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            committer_email: config.committer_email().to_string(),
            verify_reencryption: config.verify_reencryption(),
            max_path_depth: config.max_path_depth(),
            backend: config.backend(),
        }
    }
}

/// Handle to a password store repository.
pub struct PassStore {
    root: PathBuf,
    branch: BranchName,
    objects: Box<dyn ObjectStore>,
    options: StoreOptions,
}

impl std::fmt::Debug for PassStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassStore")
            .field("root", &self.root)
            .field("branch", &self.branch)
            .field("options", &self.options)
            .finish()
    }
}

impl PassStore {
    /// Open the store at `root` with default options, bootstrapping it if
    /// `root` does not exist.
    pub fn open(root: &Path, branch: BranchName) -> Result<Self, StoreError> {
        Self::open_with(root, branch, StoreOptions::default())
    }

    /// Open the store described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::open_with(&config.root(), config.branch(), StoreOptions::from(config))
    }

    /// Open the store at `root`.
    ///
    /// If `root` does not exist it is created as a bare repository whose
    /// `branch` holds a single "Initial Commit" with an empty tree.
    /// Otherwise the existing repository is opened and `branch` must
    /// resolve.
    pub fn open_with(
        root: &Path,
        branch: BranchName,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let git = if root.exists() {
            Git::open(root)?
        } else {
            create_private_dir(root)?;
            Git::init_bare(root, &branch, &options.committer_email)?
        };

        // Fail now rather than on first use
        git.resolve_branch(&branch)?;

        let objects: Box<dyn ObjectStore> = match options.backend {
            Backend::Libgit2 => Box::new(git),
            Backend::FastImport => Box::new(FastImportStore::new(git)),
        };
        info!(root = %root.display(), %branch, backend = %options.backend, "opened password store");

        Ok(Self {
            root: root.to_path_buf(),
            branch,
            objects,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Start a read transaction pinned to the current branch tip.
    pub fn begin(&self) -> Result<ReadTx<'_>, StoreError> {
        ReadTx::begin(
            self.objects.as_ref(),
            &self.branch,
            self.options.max_path_depth,
        )
    }

    /// Start a write transaction pinned to the current branch tip.
    pub fn begin_w(&self) -> Result<WriteTx<'_>, StoreError> {
        Ok(WriteTx::new(self.begin()?, &self.options))
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
