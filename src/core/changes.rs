//! core::changes
//!
//! The pending change set of a write transaction.
//!
//! A [`ChangeSet`] records file puts, file deletions, and recipient-list
//! changes keyed by canonical path. Maps are ordered so that every
//! consumer (the libgit2 tree builder, the fast-import stream) sees the
//! same deterministic sequence of records.
//!
//! Recipient changes are applied before file changes. An empty recipient
//! list removes the directory's `.gpg-id` override.

use std::collections::BTreeMap;

use crate::core::types::{PassPath, RecipientList};

/// A pending change to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// Replace the file with these bytes (may be empty).
    Put(Vec<u8>),
    /// Remove the path.
    Delete,
}

/// One record of a materialized change set, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Write `content` as a regular, non-executable file at `path`.
    Write {
        path: &'a PassPath,
        content: OperationContent<'a>,
    },
    /// Remove `path`.
    Remove { path: &'a PassPath },
}

/// Content of a [`Operation::Write`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationContent<'a> {
    Bytes(&'a [u8]),
    Recipients(&'a RecipientList),
}

impl OperationContent<'_> {
    /// The bytes written to the file.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            OperationContent::Bytes(b) => b.to_vec(),
            OperationContent::Recipients(list) => list.render().into_bytes(),
        }
    }
}

impl<'a> Operation<'a> {
    pub fn path(&self) -> &'a PassPath {
        match self {
            Operation::Write { path, .. } | Operation::Remove { path } => path,
        }
    }
}

/// Pending file and recipient changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    files: BTreeMap<PassPath, FileChange>,
    /// Keyed by the recipient file path (`<dir>/.gpg-id`).
    recipients: BTreeMap<PassPath, RecipientList>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, path: PassPath, content: Vec<u8>) {
        self.files.insert(path, FileChange::Put(content));
    }

    pub fn delete(&mut self, path: PassPath) {
        self.files.insert(path, FileChange::Delete);
    }

    /// Record a new recipient list for directory `dir`.
    pub fn set_recipients(&mut self, dir: &PassPath, recipients: RecipientList) {
        self.recipients.insert(dir.recipient_file(), recipients);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.recipients.is_empty()
    }

    pub fn files(&self) -> &BTreeMap<PassPath, FileChange> {
        &self.files
    }

    /// Pending recipient lists keyed by recipient file path.
    pub fn recipients(&self) -> &BTreeMap<PassPath, RecipientList> {
        &self.recipients
    }

    /// Pending recipient list for directory `dir`, if one was set.
    pub fn recipients_for(&self, dir: &PassPath) -> Option<&RecipientList> {
        self.recipients.get(&dir.recipient_file())
    }

    /// Whether a put or delete is pending for `path`.
    pub fn touches_file(&self, path: &PassPath) -> bool {
        self.files.contains_key(path)
    }

    /// All records in application order: recipient files first, then
    /// files, each group sorted by path. A later record for the same
    /// path supersedes an earlier one.
    pub fn operations(&self) -> Vec<Operation<'_>> {
        let recipients = self.recipients.iter().map(|(path, list)| {
            if list.is_empty() {
                Operation::Remove { path }
            } else {
                Operation::Write {
                    path,
                    content: OperationContent::Recipients(list),
                }
            }
        });
        let files = self.files.iter().map(|(path, change)| match change {
            FileChange::Put(bytes) => Operation::Write {
                path,
                content: OperationContent::Bytes(bytes),
            },
            FileChange::Delete => Operation::Remove { path },
        });
        recipients.chain(files).collect()
    }

    /// Records with later duplicates of the same path collapsed, so each
    /// path appears at most once.
    pub fn resolved_operations(&self) -> Vec<Operation<'_>> {
        let mut by_path: BTreeMap<&PassPath, Operation<'_>> = BTreeMap::new();
        for op in self.operations() {
            by_path.insert(op.path(), op);
        }
        by_path.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PassPath {
        PassPath::new(s)
    }

    #[test]
    fn put_and_delete_overwrite_each_other() {
        let mut changes = ChangeSet::new();
        changes.put(p("a.gpg"), b"x".to_vec());
        changes.delete(p("a.gpg"));
        assert_eq!(changes.files().get(&p("a.gpg")), Some(&FileChange::Delete));

        changes.put(p("a.gpg"), Vec::new());
        assert_eq!(
            changes.files().get(&p("a.gpg")),
            Some(&FileChange::Put(Vec::new()))
        );
    }

    #[test]
    fn recipients_keyed_by_recipient_file() {
        let mut changes = ChangeSet::new();
        changes.set_recipients(&p("team"), RecipientList::new(["K1"]));
        assert!(changes.recipients().contains_key(&p("team/.gpg-id")));
        assert_eq!(
            changes.recipients_for(&p("team")).unwrap().as_slice(),
            ["K1"]
        );
        assert!(changes.recipients_for(&p("other")).is_none());
    }

    #[test]
    fn operations_put_recipients_first() {
        let mut changes = ChangeSet::new();
        changes.put(p("a/x.gpg"), b"1".to_vec());
        changes.delete(p("b.gpg"));
        changes.set_recipients(&p("z"), RecipientList::new(["K"]));
        changes.set_recipients(&p("a"), RecipientList::default());

        let ops = changes.operations();
        let paths: Vec<&str> = ops.iter().map(|op| op.path().as_str()).collect();
        assert_eq!(paths, ["a/.gpg-id", "z/.gpg-id", "a/x.gpg", "b.gpg"]);
        assert!(matches!(ops[0], Operation::Remove { .. }));
        assert!(matches!(ops[1], Operation::Write { .. }));
        assert!(matches!(ops[3], Operation::Remove { .. }));
    }

    #[test]
    fn resolved_operations_last_record_wins() {
        let mut changes = ChangeSet::new();
        changes.set_recipients(&p("d"), RecipientList::new(["K"]));
        changes.put(p("d/.gpg-id"), b"RAW".to_vec());

        let ops = changes.resolved_operations();
        assert_eq!(ops.len(), 1);
        match ops[0] {
            Operation::Write { content, .. } => assert_eq!(content.to_bytes(), b"RAW"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn recipient_content_is_newline_joined() {
        let list = RecipientList::new(["A", "B"]);
        assert_eq!(OperationContent::Recipients(&list).to_bytes(), b"A\nB");
    }

    #[test]
    fn empty_and_touches() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());
        changes.delete(p("x"));
        assert!(!changes.is_empty());
        assert!(changes.touches_file(&p("x")));
        assert!(!changes.touches_file(&p("y")));
    }
}
