//! git::fast_import
//!
//! Commit materialization through `git fast-import`.
//!
//! # Stream Format
//!
//! One change set becomes exactly one `commit` command:
//!
//! ```text
//! commit refs/heads/<branch>
//! committer <name> <<email>> <unix-seconds> <+hhmm>
//! data <len>
//! <message>
//! from <parent-oid>
//! M 644 inline <recipient-file>      (one per recipient change)
//! data <len>
//! <key ids, newline-joined>
//! M 644 inline <path>                (one per put)
//! data <len>
//! <bytes>
//! D <path>                           (one per delete)
//! done
//! ```
//!
//! [`FastImportWriter`] enforces that ordering: the header must come
//! first, records follow, and `done` ends the stream.

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use super::{CommitRequest, CommitTime, Committer, Git, GitError, ObjectStore, TreeEntry};
use crate::core::changes::Operation;
use crate::core::types::{BranchName, Oid, PassPath, RefName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Records,
}

/// Writes a single-commit fast-import stream.
#[derive(Debug)]
pub struct FastImportWriter<W: Write> {
    out: W,
    state: State,
}

impl<W: Write> FastImportWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: State::Header,
        }
    }

    /// Emit the whole stream for `request` and return the underlying writer.
    pub fn write_request(mut self, request: &CommitRequest<'_>) -> io::Result<W> {
        self.commit_header(
            &RefName::for_branch(request.branch),
            request.committer,
            request.time,
            request.message,
            request.parent,
        )?;
        for op in request.changes.operations() {
            match op {
                Operation::Write { path, content } => self.modify(path, &content.to_bytes())?,
                Operation::Remove { path } => self.delete(path)?,
            }
        }
        self.finish()
    }

    /// Emit the `commit` header. Must be called exactly once, first.
    pub fn commit_header(
        &mut self,
        refname: &RefName,
        committer: &Committer,
        time: CommitTime,
        message: &str,
        parent: &Oid,
    ) -> io::Result<()> {
        if self.state != State::Header {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "commit header already written",
            ));
        }
        writeln!(self.out, "commit {}", refname)?;
        writeln!(
            self.out,
            "committer {} <{}> {} {}",
            committer.name,
            committer.email,
            time.timestamp(),
            time.format_offset()
        )?;
        self.data(message.as_bytes())?;
        writeln!(self.out, "from {}", parent)?;
        self.state = State::Records;
        Ok(())
    }

    /// Emit an inline regular-file write.
    pub fn modify(&mut self, path: &PassPath, content: &[u8]) -> io::Result<()> {
        self.expect_records()?;
        writeln!(self.out, "M 644 inline {}", quote_path(path.as_str()))?;
        self.data(content)
    }

    /// Emit a path deletion.
    pub fn delete(&mut self, path: &PassPath) -> io::Result<()> {
        self.expect_records()?;
        writeln!(self.out, "D {}", quote_path(path.as_str()))
    }

    /// Emit the terminating marker, flush, and return the writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.expect_records()?;
        self.out.write_all(b"done\n")?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn data(&mut self, bytes: &[u8]) -> io::Result<()> {
        writeln!(self.out, "data {}", bytes.len())?;
        self.out.write_all(bytes)?;
        self.out.write_all(b"\n")
    }

    fn expect_records(&self) -> io::Result<()> {
        if self.state != State::Records {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "commit header must be written first",
            ));
        }
        Ok(())
    }
}

/// C-style quote a path when fast-import would otherwise misread it.
fn quote_path(path: &str) -> String {
    if !path.starts_with('"') && !path.contains('\n') {
        return path.to_string();
    }
    let mut quoted = String::with_capacity(path.len() + 2);
    quoted.push('"');
    for c in path.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// An [`ObjectStore`] that reads through libgit2 and commits through
/// a `git fast-import` child process.
#[derive(Debug)]
pub struct FastImportStore {
    git: Git,
}

impl FastImportStore {
    pub fn new(git: Git) -> Self {
        Self { git }
    }

    fn tool_error(status: impl Into<String>, stderr: impl Into<String>) -> GitError {
        GitError::ExternalTool {
            command: "git fast-import".to_string(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    fn run(&self, request: &CommitRequest<'_>) -> Result<(), GitError> {
        let mut child = Command::new("git")
            .arg("--git-dir")
            .arg(self.git.git_dir())
            .args(["fast-import", "--quiet", "--date-format=raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::tool_error("spawn failed", e.to_string()))?;

        let written = match child.stdin.take() {
            Some(stdin) => FastImportWriter::new(BufWriter::new(stdin))
                .write_request(request)
                .map(drop),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "no stdin")),
        };

        if let Err(e) = written {
            // Reap the child so no handle outlives this call
            let _ = child.kill();
            let stderr = child
                .wait_with_output()
                .map(|o| String::from_utf8_lossy(&o.stderr).into_owned())
                .unwrap_or_default();
            return Err(Self::tool_error(format!("stream write failed: {}", e), stderr));
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Self::tool_error("wait failed", e.to_string()))?;
        if !output.status.success() {
            return Err(Self::tool_error(
                output.status.to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }
}

impl ObjectStore for FastImportStore {
    fn git_dir(&self) -> &Path {
        self.git.git_dir()
    }

    fn resolve_branch(&self, branch: &BranchName) -> Result<Oid, GitError> {
        self.git.resolve_branch(branch)
    }

    fn commit_tree(&self, commit: &Oid) -> Result<Oid, GitError> {
        self.git.commit_tree(commit)
    }

    fn tree_entries(&self, tree: &Oid) -> Result<Vec<TreeEntry>, GitError> {
        self.git.tree_entries(tree)
    }

    fn find_entry(&self, tree: &Oid, name: &str) -> Result<Option<TreeEntry>, GitError> {
        self.git.find_entry(tree, name)
    }

    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, GitError> {
        self.git.read_blob(blob)
    }

    fn commit_changes(&self, request: &CommitRequest<'_>) -> Result<Oid, GitError> {
        let refname = RefName::for_branch(request.branch);
        let before = self.git.resolve_ref(refname.as_str())?;
        if &before != request.parent {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: request.parent.to_string(),
                actual: before.to_string(),
            });
        }

        self.run(request)?;

        // fast-import moves the ref itself; confirm it landed on top of our parent
        let after = self.git.resolve_ref(refname.as_str())?;
        let parents = self.git.commit_parents(&after)?;
        if after == before || parents.len() != 1 || &parents[0] != request.parent {
            warn!(branch = %request.branch, tip = %after, "fast-import did not advance branch onto parent");
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: request.parent.to_string(),
                actual: after.to_string(),
            });
        }
        debug!(branch = %request.branch, commit = %after, "fast-import moved branch");
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::changes::ChangeSet;
    use crate::core::types::RecipientList;

    fn render(changes: &ChangeSet, message: &str) -> String {
        let branch = BranchName::default();
        let parent = Oid::new("0123456789abcdef0123456789abcdef01234567").unwrap();
        let committer = Committer::new("alice", "pass@localhost");
        let request = CommitRequest {
            branch: &branch,
            parent: &parent,
            committer: &committer,
            time: CommitTime::new(1_700_000_000, 60),
            message,
            changes,
        };
        let out = FastImportWriter::new(Vec::new())
            .write_request(&request)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn header_then_records_then_done() {
        let mut changes = ChangeSet::new();
        changes.set_recipients(&PassPath::new("team"), RecipientList::new(["KA", "KB"]));
        changes.put(PassPath::new("team/a.gpg"), b"cipher".to_vec());
        changes.delete(PassPath::new("old.gpg"));

        let stream = render(&changes, "Update passwords");
        let expected = "\
commit refs/heads/master
committer alice <pass@localhost> 1700000000 +0100
data 16
Update passwords
from 0123456789abcdef0123456789abcdef01234567
M 644 inline team/.gpg-id
data 5
KA
KB
D old.gpg
M 644 inline team/a.gpg
data 6
cipher
done
";
        assert_eq!(stream, expected);
    }

    #[test]
    fn empty_put_has_zero_length_data() {
        let mut changes = ChangeSet::new();
        changes.put(PassPath::new("empty.gpg"), Vec::new());
        let stream = render(&changes, "m");
        assert!(stream.contains("M 644 inline empty.gpg\ndata 0\n\n"));
    }

    #[test]
    fn cleared_recipients_delete_the_override() {
        let mut changes = ChangeSet::new();
        changes.set_recipients(&PassPath::new("team"), RecipientList::default());
        let stream = render(&changes, "m");
        assert!(stream.contains("D team/.gpg-id\n"));
    }

    #[test]
    fn records_before_header_are_rejected() {
        let mut writer = FastImportWriter::new(Vec::new());
        let err = writer.delete(&PassPath::new("x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(FastImportWriter::new(Vec::new()).finish().is_err());
    }

    #[test]
    fn second_header_is_rejected() {
        let mut writer = FastImportWriter::new(Vec::new());
        let refname = RefName::new("refs/heads/master").unwrap();
        let committer = Committer::new("a", "b@c");
        let parent = Oid::new("a".repeat(40)).unwrap();
        let time = CommitTime::new(0, 0);
        writer
            .commit_header(&refname, &committer, time, "m", &parent)
            .unwrap();
        assert!(writer
            .commit_header(&refname, &committer, time, "m", &parent)
            .is_err());
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_path("a b/c.gpg"), "a b/c.gpg");
        assert_eq!(quote_path("\"odd"), "\"\\\"odd\"");
        assert_eq!(quote_path("two\nlines"), "\"two\\nlines\"");
    }
}
