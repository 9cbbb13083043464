//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`PassPath`] - Canonical slash-separated path inside the store
//! - [`EntryKind`] / [`Dirent`] - Directory listing entries
//! - [`RecipientList`] - Parsed contents of a `.gpg-id` file
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use gitpass::core::types::{BranchName, Oid, PassPath, RefName};
//!
//! let branch = BranchName::new("master").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "refs/heads/master");
//!
//! let path = PassPath::new("/web/../email/./work.gpg");
//! assert_eq!(path.as_str(), "email/work.gpg");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the reserved file holding a directory's recipient list.
pub const RECIPIENT_FILE: &str = ".gpg-id";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Check the refname rules shared by branch and ref names.
///
/// Returns a description of the first violated rule.
fn refname_violation(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("cannot be empty".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("cannot start or end with '/'".into());
    }
    if name.ends_with(".lock") {
        return Some("cannot end with '.lock'".into());
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Some(format!("cannot contain '{bad}'"));
        }
    }
    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Some(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Some("cannot contain control characters".into());
    }
    if name
        .split('/')
        .any(|component| component.starts_with('.') || component.ends_with(".lock"))
    {
        return Some("path component cannot start with '.' or end with '.lock'".into());
    }
    None
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use gitpass::core::types::BranchName;
///
/// let name = BranchName::new("passwords/main").unwrap();
/// assert_eq!(name.as_str(), "passwords/main");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        if let Some(problem) = refname_violation(&name) {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name {problem}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BranchName {
    fn default() -> Self {
        Self("master".to_string())
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use gitpass::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git reference name.
///
/// # Example
///
/// ```
/// use gitpass::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("master").unwrap();
/// assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/master");
/// assert!(RefName::new("refs/heads/a..b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(problem) = refname_violation(&name) {
            return Err(TypeError::InvalidRefName(format!("ref name {problem}")));
        }
        Ok(Self(name))
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        // Branch names are already validated
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A canonical path inside the password store.
///
/// Construction never fails: the input is cleaned lexically. Empty
/// segments and `.` are dropped, `..` removes the previous segment and is
/// clamped at the root, and any leading slash is stripped. The empty
/// path is the root directory.
///
/// # Example
///
/// ```
/// use gitpass::core::types::PassPath;
///
/// assert!(PassPath::new("").is_root());
/// assert!(PassPath::new("/").is_root());
/// assert!(PassPath::new(".").is_root());
/// assert_eq!(PassPath::new("a//b/").as_str(), "a/b");
/// assert_eq!(PassPath::new("../../a").as_str(), "a");
///
/// let p = PassPath::new("web/github.gpg");
/// assert_eq!(p.parent().unwrap().as_str(), "web");
/// assert_eq!(p.file_name(), Some("github.gpg"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PassPath(String);

impl PassPath {
    /// Clean `path` into canonical form.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.as_ref().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        Self(segments.join("/"))
    }

    /// The root directory.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Whether this is the root directory.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the path as a string slice (no leading slash, root is `""`).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments (the root has depth 0).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<PassPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a single child name.
    ///
    /// `name` is cleaned the same way as [`PassPath::new`], so a name
    /// containing slashes appends several segments.
    pub fn join(&self, name: &str) -> PassPath {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(format!("{}/{}", self.0, name))
        }
    }

    /// Path of the reserved recipient file inside this directory.
    pub fn recipient_file(&self) -> PassPath {
        self.join(RECIPIENT_FILE)
    }

    /// Whether `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &PassPath) -> bool {
        other.is_root()
            || self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'/'))
    }
}

impl From<String> for PassPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for PassPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<PassPath> for String {
    fn from(path: PassPath) -> Self {
        path.0
    }
}

impl AsRef<str> for PassPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PassPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a tree entry is a file (blob) or a directory (tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn is_file(self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(self) -> bool {
        matches!(self, EntryKind::Dir)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Dir => write!(f, "dir"),
        }
    }
}

/// A directory entry as seen by listing and walking.
///
/// In `List` results `name` is the bare child name; in `Walk` callbacks
/// it is the full store path of the visited node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirent {
    pub name: String,
    pub kind: EntryKind,
}

impl Dirent {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }
}

/// The parsed contents of a `.gpg-id` file.
///
/// One key ID per line; each line is trimmed and blank lines are ignored.
///
/// # Example
///
/// ```
/// use gitpass::core::types::RecipientList;
///
/// let list = RecipientList::parse(b"  KEYA\n\nKEYB  \n");
/// assert_eq!(list.as_slice(), ["KEYA", "KEYB"]);
/// assert_eq!(list.render(), "KEYA\nKEYB");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientList(Vec<String>);

impl RecipientList {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            keys.into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        )
    }

    /// Parse the raw bytes of a recipient file.
    pub fn parse(bytes: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(bytes).lines())
    }

    /// Newline-joined key IDs, as written to the recipient file.
    pub fn render(&self) -> String {
        self.0.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k == key)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}
