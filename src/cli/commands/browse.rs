//! ls, show, type and walk commands

use std::io::Write;

use anyhow::{bail, Context as _, Result};
use serde_json::json;

use super::{print_json, print_lines};
use crate::cli::Context;
use crate::core::types::{Dirent, EntryKind, PassPath};
use crate::store::{PassRead, WalkControl};

/// List a directory. Subdirectories get a trailing `/`.
pub fn ls(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;
    let entries = tx.list(path)?;

    if ctx.json {
        return print_json(&entries);
    }
    for entry in entries {
        match entry.kind {
            EntryKind::Dir => println!("{}/", entry.name),
            EntryKind::File => println!("{}", entry.name),
        }
    }
    Ok(())
}

/// Copy a file's contents to stdout unchanged.
pub fn show(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;
    let contents = tx.get(path)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&contents)
        .and_then(|_| stdout.flush())
        .context("Failed to write to stdout")?;
    Ok(())
}

pub fn type_cmd(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;
    let path = PassPath::new(path);

    let Some(kind) = tx.entry_kind(path.as_str())? else {
        bail!("not found: /{}", path);
    };
    if ctx.json {
        return print_json(&json!({ "path": path, "kind": kind }));
    }
    println!("{}", kind);
    Ok(())
}

/// Print every non-hidden path beneath `path`, breadth first.
pub fn walk(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;

    let mut visited: Vec<Dirent> = Vec::new();
    tx.walk(path, &mut |dirent| {
        visited.push(dirent.clone());
        Ok(WalkControl::Continue)
    })?;

    if ctx.json {
        return print_json(&visited);
    }
    let names: Vec<String> = visited
        .into_iter()
        .map(|d| match d.kind {
            EntryKind::Dir if d.name.is_empty() => "/".to_string(),
            EntryKind::Dir => format!("{}/", d.name),
            EntryKind::File => d.name,
        })
        .collect();
    print_lines(ctx, &names)
}
