//! store::read
//!
//! Snapshot reads: path resolution, listing, recipient resolution,
//! affected-file discovery and breadth-first walking.
//!
//! # Recipient Resolution
//!
//! Closest ancestor wins, entirely. The effective recipients of a path are
//! the contents of the nearest `.gpg-id` found walking from the path up to
//! the root; lists are never merged. An empty or missing `.gpg-id` does not
//! count as an override.
//!
//! # Affected Files
//!
//! The files affected by a recipient change at `dir` are exactly the files
//! whose recipients currently resolve through `dir`: everything beneath it
//! except subtrees rooted at a directory with its own override.

use std::collections::VecDeque;

use tracing::debug;

use super::StoreError;
use crate::core::changes::ChangeSet;
use crate::core::types::{BranchName, Dirent, EntryKind, Oid, PassPath, RecipientList};
use crate::git::{ObjectStore, TreeEntry};

/// What a walk visitor wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Keep going, expanding the visited node if it is a directory.
    Continue,
    /// Do not expand the visited node.
    SkipSubtree,
}

/// Read operations over one immutable snapshot.
///
/// Implementors provide the four primitive lookups; recipient resolution,
/// walking and affected-file discovery have generic defaults built on
/// them. A backend that can walk trees more cheaply overrides
/// [`PassRead::walk`].
pub trait PassRead {
    /// Kind of the entry at `path`, or `None` if it does not exist.
    fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, StoreError>;

    /// Contents of the file at `path`.
    ///
    /// Fails with `NotFound` if absent and `InvalidType` for a directory.
    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Non-hidden children of the directory at `path`, by bare name.
    ///
    /// Fails with `NotFound` if absent and `InvalidType` for a file.
    fn list(&self, path: &str) -> Result<Vec<Dirent>, StoreError>;

    /// Effective recipient list of `path`.
    fn recipients(&self, path: &str) -> Result<RecipientList, StoreError> {
        let mut dir = PassPath::new(path);
        loop {
            if let Some(list) = own_recipients(self, &dir)? {
                return Ok(list);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Ok(RecipientList::default()),
            }
        }
    }

    /// Files whose recipients currently resolve through `path`.
    fn affected_files(&self, path: &str) -> Result<Vec<PassPath>, StoreError> {
        collect_affected(self, &PassPath::new(path), None)
    }

    /// Breadth-first traversal from `path`, visiting `path` itself first.
    ///
    /// Visited names are full store paths. Hidden entries are never
    /// queued. This default is built purely from [`PassRead::entry_kind`]
    /// and [`PassRead::list`].
    fn walk(
        &self,
        path: &str,
        visit: &mut dyn FnMut(&Dirent) -> Result<WalkControl, StoreError>,
    ) -> Result<(), StoreError> {
        let start = PassPath::new(path);
        let kind = self
            .entry_kind(start.as_str())?
            .ok_or_else(|| StoreError::NotFound {
                path: start.clone(),
            })?;

        let mut queue = VecDeque::from([(start, kind)]);
        while let Some((path, kind)) = queue.pop_front() {
            if visit(&Dirent::new(path.as_str(), kind))? == WalkControl::SkipSubtree {
                continue;
            }
            if kind.is_dir() {
                for child in self.list(path.as_str())? {
                    queue.push_back((path.join(&child.name), child.kind));
                }
            }
        }
        Ok(())
    }
}

/// Non-empty recipient list stored directly in `dir`, if any.
fn own_recipients<R: PassRead + ?Sized>(
    reader: &R,
    dir: &PassPath,
) -> Result<Option<RecipientList>, StoreError> {
    match reader.get(dir.recipient_file().as_str()) {
        Ok(bytes) => {
            let list = RecipientList::parse(&bytes);
            Ok((!list.is_empty()).then_some(list))
        }
        Err(e) if e.is_not_found() || e.is_invalid_type() => Ok(None),
        // `dir` sits at the depth limit, so it cannot hold a `.gpg-id`
        Err(StoreError::PathTooDeep { path, max }) if path.depth() == max + 1 => Ok(None),
        Err(e) => Err(e),
    }
}

/// Walk `root` collecting files, pruning directories with their own
/// override. Overrides pending in `pending` take precedence over the
/// snapshot: a non-empty pending list prunes, an empty one un-prunes.
pub(crate) fn collect_affected<R: PassRead + ?Sized>(
    reader: &R,
    root: &PassPath,
    pending: Option<&ChangeSet>,
) -> Result<Vec<PassPath>, StoreError> {
    let mut files = Vec::new();
    reader.walk(root.as_str(), &mut |dirent| {
        if dirent.name == root.as_str() {
            return Ok(WalkControl::Continue);
        }
        let path = PassPath::new(&dirent.name);
        match dirent.kind {
            EntryKind::File => {
                files.push(path);
                Ok(WalkControl::Continue)
            }
            EntryKind::Dir => {
                let overridden = match pending.and_then(|p| p.recipients_for(&path)) {
                    Some(list) => !list.is_empty(),
                    None => own_recipients(reader, &path)?.is_some(),
                };
                Ok(if overridden {
                    WalkControl::SkipSubtree
                } else {
                    WalkControl::Continue
                })
            }
        }
    })?;
    Ok(files)
}

/// A read transaction pinned to one commit.
///
/// Every read resolves against the tree of the commit that was the branch
/// tip when the transaction began; later commits are never observed.
pub struct ReadTx<'a> {
    store: &'a dyn ObjectStore,
    branch: BranchName,
    commit: Oid,
    root: Oid,
    max_depth: usize,
}

impl std::fmt::Debug for ReadTx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTx")
            .field("branch", &self.branch)
            .field("commit", &self.commit)
            .finish()
    }
}

impl<'a> ReadTx<'a> {
    /// Pin the current tip of `branch`.
    pub(crate) fn begin(
        store: &'a dyn ObjectStore,
        branch: &BranchName,
        max_depth: usize,
    ) -> Result<Self, StoreError> {
        let commit = store.resolve_branch(branch)?;
        let root = store.commit_tree(&commit)?;
        debug!(%branch, commit = %commit, "began transaction");
        Ok(Self {
            store,
            branch: branch.clone(),
            commit,
            root,
            max_depth,
        })
    }

    /// The commit this transaction reads from.
    pub fn commit_id(&self) -> &Oid {
        &self.commit
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub(crate) fn object_store(&self) -> &'a dyn ObjectStore {
        self.store
    }

    /// Deepest path, in segments, this transaction will resolve.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve `path` to its tree entry, one segment at a time from the
    /// pinned root.
    fn resolve(&self, path: &PassPath) -> Result<TreeEntry, StoreError> {
        let depth = path.depth();
        if depth > self.max_depth {
            return Err(StoreError::PathTooDeep {
                path: path.clone(),
                max: self.max_depth,
            });
        }

        let mut current = TreeEntry {
            name: String::new(),
            oid: self.root.clone(),
            kind: EntryKind::Dir,
        };
        for segment in path.segments() {
            if current.kind != EntryKind::Dir {
                return Err(StoreError::NotFound { path: path.clone() });
            }
            current = self
                .store
                .find_entry(&current.oid, segment)?
                .ok_or_else(|| StoreError::NotFound { path: path.clone() })?;
        }
        Ok(current)
    }
}

impl PassRead for ReadTx<'_> {
    fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, StoreError> {
        match self.resolve(&PassPath::new(path)) {
            Ok(entry) => Ok(Some(entry.kind)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let path = PassPath::new(path);
        let entry = self.resolve(&path)?;
        if entry.kind != EntryKind::File {
            return Err(StoreError::InvalidType {
                path,
                expected: EntryKind::File,
            });
        }
        Ok(self.store.read_blob(&entry.oid)?)
    }

    fn list(&self, path: &str) -> Result<Vec<Dirent>, StoreError> {
        let path = PassPath::new(path);
        let entry = self.resolve(&path)?;
        if entry.kind != EntryKind::Dir {
            return Err(StoreError::InvalidType {
                path,
                expected: EntryKind::Dir,
            });
        }
        Ok(self
            .store
            .tree_entries(&entry.oid)?
            .into_iter()
            .filter(|e| !e.name.starts_with('.'))
            .map(|e| Dirent::new(e.name, e.kind))
            .collect())
    }

    /// Breadth-first walk over tree objects directly, without resolving
    /// every visited path from the root again.
    fn walk(
        &self,
        path: &str,
        visit: &mut dyn FnMut(&Dirent) -> Result<WalkControl, StoreError>,
    ) -> Result<(), StoreError> {
        let start = PassPath::new(path);
        let entry = self.resolve(&start)?;

        let mut queue = VecDeque::from([(start, entry)]);
        while let Some((path, entry)) = queue.pop_front() {
            if visit(&Dirent::new(path.as_str(), entry.kind))? == WalkControl::SkipSubtree {
                continue;
            }
            if entry.kind == EntryKind::Dir {
                for child in self.store.tree_entries(&entry.oid)? {
                    if child.name.starts_with('.') {
                        continue;
                    }
                    queue.push_back((path.join(&child.name), child));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory reader exercising the trait defaults.
    #[derive(Default)]
    struct MapReader {
        files: HashMap<String, Vec<u8>>,
    }

    impl MapReader {
        fn with(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
                    .collect(),
            }
        }

        fn is_dir(&self, path: &PassPath) -> bool {
            self.files
                .keys()
                .any(|f| PassPath::new(f).starts_with(path) && f != path.as_str())
        }
    }

    impl PassRead for MapReader {
        fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, StoreError> {
            let path = PassPath::new(path);
            if self.files.contains_key(path.as_str()) {
                Ok(Some(EntryKind::File))
            } else if path.is_root() || self.is_dir(&path) {
                Ok(Some(EntryKind::Dir))
            } else {
                Ok(None)
            }
        }

        fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            let path = PassPath::new(path);
            match self.files.get(path.as_str()) {
                Some(c) => Ok(c.clone()),
                None if self.is_dir(&path) => Err(StoreError::InvalidType {
                    path,
                    expected: EntryKind::File,
                }),
                None => Err(StoreError::NotFound { path }),
            }
        }

        fn list(&self, path: &str) -> Result<Vec<Dirent>, StoreError> {
            let dir = PassPath::new(path);
            let mut out: Vec<Dirent> = Vec::new();
            for f in self.files.keys() {
                let f = PassPath::new(f);
                if f == dir || !f.starts_with(&dir) {
                    continue;
                }
                let rest = &f.as_str()[if dir.is_root() { 0 } else { dir.as_str().len() + 1 }..];
                let (name, kind) = match rest.split_once('/') {
                    Some((head, _)) => (head, EntryKind::Dir),
                    None => (rest, EntryKind::File),
                };
                if !name.starts_with('.') && !out.iter().any(|d| d.name == name) {
                    out.push(Dirent::new(name, kind));
                }
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        }
    }

    fn scenario() -> MapReader {
        MapReader::with(&[
            ("secrets/.gpg-id", "KEYA\n"),
            ("secrets/nested/.gpg-id", "KEYB"),
            ("secrets/top.gpg", "t"),
            ("secrets/nested/deep.gpg", "d"),
            ("loose.gpg", "l"),
        ])
    }

    #[test]
    fn default_recipients_closest_wins() {
        let r = scenario();
        assert_eq!(r.recipients("secrets/top.gpg").unwrap().as_slice(), ["KEYA"]);
        assert_eq!(
            r.recipients("secrets/nested/deep.gpg").unwrap().as_slice(),
            ["KEYB"]
        );
        assert!(r.recipients("loose.gpg").unwrap().is_empty());
        assert!(r.recipients("").unwrap().is_empty());
    }

    #[test]
    fn empty_recipient_file_is_not_an_override() {
        let r = MapReader::with(&[
            (".gpg-id", "ROOT"),
            ("a/.gpg-id", "  \n"),
            ("a/x.gpg", "x"),
        ]);
        assert_eq!(r.recipients("a/x.gpg").unwrap().as_slice(), ["ROOT"]);
        assert_eq!(
            r.affected_files("").unwrap(),
            vec![PassPath::new("a/x.gpg")]
        );
    }

    #[test]
    fn default_walk_is_breadth_first_and_hides_dotfiles() {
        let r = scenario();
        let mut seen = Vec::new();
        r.walk("secrets", &mut |d| {
            seen.push(d.name.clone());
            Ok(WalkControl::Continue)
        })
        .unwrap();
        assert_eq!(
            seen,
            ["secrets", "secrets/nested", "secrets/top.gpg", "secrets/nested/deep.gpg"]
        );
    }

    #[test]
    fn default_walk_skips_subtrees() {
        let r = scenario();
        let mut seen = Vec::new();
        r.walk("", &mut |d| {
            seen.push(d.name.clone());
            Ok(if d.name == "secrets" {
                WalkControl::SkipSubtree
            } else {
                WalkControl::Continue
            })
        })
        .unwrap();
        assert_eq!(seen, ["", "loose.gpg", "secrets"]);
    }

    #[test]
    fn default_walk_missing_start_is_not_found() {
        let r = scenario();
        let err = r.walk("nope", &mut |_| Ok(WalkControl::Continue)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn visitor_errors_abort_the_walk() {
        let r = scenario();
        let mut count = 0;
        let err = r
            .walk("", &mut |_| {
                count += 1;
                Err(StoreError::NotFound {
                    path: PassPath::new("stop"),
                })
            })
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(count, 1);
    }

    #[test]
    fn affected_files_stop_at_overrides() {
        let r = scenario();
        assert_eq!(
            r.affected_files("secrets").unwrap(),
            vec![PassPath::new("secrets/top.gpg")]
        );
        assert_eq!(
            r.affected_files("").unwrap(),
            vec![PassPath::new("loose.gpg")]
        );
        assert!(r.affected_files("secrets/top.gpg").unwrap().is_empty());
    }

    /// Reader that refuses paths with more than two segments.
    struct Capped(MapReader);

    impl Capped {
        fn check(path: &str) -> Result<(), StoreError> {
            let path = PassPath::new(path);
            if path.depth() > 2 {
                return Err(StoreError::PathTooDeep { path, max: 2 });
            }
            Ok(())
        }
    }

    impl PassRead for Capped {
        fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, StoreError> {
            Self::check(path)?;
            self.0.entry_kind(path)
        }

        fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            Self::check(path)?;
            self.0.get(path)
        }

        fn list(&self, path: &str) -> Result<Vec<Dirent>, StoreError> {
            Self::check(path)?;
            self.0.list(path)
        }
    }

    #[test]
    fn paths_at_the_depth_limit_resolve_recipients() {
        let r = Capped(MapReader::with(&[
            (".gpg-id", "ROOT"),
            ("a/.gpg-id", "KEYA"),
            ("a/x", "x"),
            ("b/y", "y"),
        ]));
        assert_eq!(r.recipients("a/x").unwrap().as_slice(), ["KEYA"]);
        assert_eq!(r.recipients("b/y").unwrap().as_slice(), ["ROOT"]);
        assert_eq!(r.affected_files("a").unwrap(), vec![PassPath::new("a/x")]);
        assert_eq!(r.affected_files("").unwrap(), vec![PassPath::new("b/y")]);

        let err = r.recipients("a/x/z").unwrap_err();
        assert!(matches!(err, StoreError::PathTooDeep { max: 2, .. }));
    }

    #[test]
    fn pending_overrides_take_precedence() {
        let r = scenario();
        let mut pending = ChangeSet::new();
        // Clearing nested's override pulls its files into the parent's set
        pending.set_recipients(&PassPath::new("secrets/nested"), RecipientList::default());
        let affected = collect_affected(&r, &PassPath::new("secrets"), Some(&pending)).unwrap();
        assert_eq!(
            affected,
            vec![
                PassPath::new("secrets/top.gpg"),
                PassPath::new("secrets/nested/deep.gpg")
            ]
        );

        // A new override prunes a directory the snapshot would have walked
        let mut pending = ChangeSet::new();
        pending.set_recipients(&PassPath::new("secrets"), RecipientList::new(["K"]));
        let affected = collect_affected(&r, &PassPath::root(), Some(&pending)).unwrap();
        assert_eq!(affected, vec![PassPath::new("loose.gpg")]);
    }
}
