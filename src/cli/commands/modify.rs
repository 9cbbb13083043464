//! insert, rm and set-recipients commands
//!
//! Each command builds exactly one write transaction and commits it. A
//! commit that loses a race with another writer is reported, not retried.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context as _, Result};
use serde_json::json;

use super::{ensure_access, print_json};
use crate::cli::args::CommitArgs;
use crate::cli::Context;
use crate::core::types::{EntryKind, Oid, PassPath};
use crate::store::{PassRead, WriteTx};

/// Store stdin as the contents of `path`.
pub fn insert(ctx: &Context, path: &str, commit: &CommitArgs) -> Result<()> {
    let path = PassPath::new(path);
    if path.is_root() {
        bail!("a file path is required");
    }

    let mut contents = Vec::new();
    std::io::stdin()
        .read_to_end(&mut contents)
        .context("Failed to read stdin")?;

    let store = ctx.open_store()?;
    let mut tx = store.begin_w()?;
    if tx.entry_kind(path.as_str())? == Some(EntryKind::Dir) {
        bail!("can't overwrite a directory: /{}", path);
    }
    ensure_access(&tx, path.as_str(), commit)?;

    tx.put(path.as_str(), contents);
    let id = tx.commit(&commit.user, &commit.message)?;
    report(ctx, "Saved", &path, &id)
}

/// Remove the file at `path`.
pub fn rm(ctx: &Context, path: &str, commit: &CommitArgs) -> Result<()> {
    let path = PassPath::new(path);
    let store = ctx.open_store()?;
    let mut tx = store.begin_w()?;

    match tx.entry_kind(path.as_str())? {
        None => bail!("not found: /{}", path),
        Some(EntryKind::Dir) => bail!("can't delete a directory: /{}", path),
        Some(EntryKind::File) => {}
    }
    ensure_access(&tx, path.as_str(), commit)?;

    tx.delete(path.as_str());
    let message = if commit.message.trim().is_empty() {
        format!("Removed {} from store.", path)
    } else {
        commit.message.clone()
    };
    let id = tx.commit(&commit.user, &message)?;
    report(ctx, "Removed", &path, &id)
}

/// Replace the recipients of directory `path` and store the re-encrypted
/// files given as `store-path=local-file` pairs.
pub fn set_recipients(
    ctx: &Context,
    path: &str,
    keys: &[String],
    files: &[String],
    commit: &CommitArgs,
) -> Result<()> {
    let dir = PassPath::new(path);
    let reencrypted = files
        .iter()
        .map(|spec| parse_file_arg(spec))
        .collect::<Result<Vec<_>>>()?;

    let store = ctx.open_store()?;
    let mut tx = store.begin_w()?;
    match tx.entry_kind(dir.as_str())? {
        None => bail!("not found: /{}", dir),
        Some(EntryKind::File) => bail!("can't change recipients of a file: /{}", dir),
        Some(EntryKind::Dir) => {}
    }
    ensure_access(&tx, dir.as_str(), commit)?;

    tx.set_recipients(dir.as_str(), keys);
    stage_files(&mut tx, reencrypted)?;

    let message = if commit.message.trim().is_empty() {
        format!("Reencrypted /{} to {}.", dir, keys.join(", "))
    } else {
        commit.message.clone()
    };
    let id = tx.commit(&commit.user, &message)?;
    report(ctx, "Updated recipients of", &dir, &id)
}

fn stage_files(tx: &mut WriteTx<'_>, files: Vec<(PassPath, PathBuf)>) -> Result<()> {
    for (path, local) in files {
        let contents = std::fs::read(&local)
            .with_context(|| format!("Failed to read {}", local.display()))?;
        tx.put(path.as_str(), contents);
    }
    Ok(())
}

/// Split `store/path.gpg=/local/file` at the first `=`.
fn parse_file_arg(spec: &str) -> Result<(PassPath, PathBuf)> {
    let (path, local) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("expected PATH=FILE, got '{}'", spec))?;
    let path = PassPath::new(path);
    if path.is_root() || local.is_empty() {
        bail!("expected PATH=FILE, got '{}'", spec);
    }
    Ok((path, PathBuf::from(local)))
}

fn report(ctx: &Context, verb: &str, path: &PassPath, id: &Oid) -> Result<()> {
    if ctx.json {
        return print_json(&json!({ "path": path, "commit": id.as_str() }));
    }
    println!("{} /{} ({})", verb, path, id.short(7));
    Ok(())
}
