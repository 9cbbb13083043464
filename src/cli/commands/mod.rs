//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler:
//! 1. Opens the store and begins a transaction
//! 2. Validates command-specific arguments against the snapshot
//! 3. Formats and displays output (plain text or `--json`)

mod browse;
mod init;
mod modify;
mod perms;

pub use browse::{ls, show, type_cmd, walk};
pub use init::init;
pub use modify::{insert, rm, set_recipients};
pub use perms::{affected, decryptable, recipients};

use anyhow::{bail, Result};
use serde::Serialize;

use super::args::{Command, CommitArgs};
use super::Context;
use crate::access;
use crate::store::PassRead;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init => init::init(ctx),

        // Reads
        Command::Ls { path } => browse::ls(ctx, &path),
        Command::Show { path } => browse::show(ctx, &path),
        Command::Type { path } => browse::type_cmd(ctx, &path),
        Command::Walk { path } => browse::walk(ctx, &path),
        Command::Recipients { path } => perms::recipients(ctx, &path),
        Command::Affected { path } => perms::affected(ctx, &path),
        Command::Decryptable { path } => perms::decryptable(ctx, &path),

        // Changes
        Command::Insert { path, commit } => modify::insert(ctx, &path, &commit),
        Command::Rm { path, commit } => modify::rm(ctx, &path, &commit),
        Command::SetRecipients {
            path,
            keys,
            files,
            commit,
        } => modify::set_recipients(ctx, &path, &keys, &files, &commit),
    }
}

/// Print `value` as pretty JSON.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print one item per line, or the whole list as JSON.
fn print_lines<T: Serialize + std::fmt::Display>(ctx: &Context, items: &[T]) -> Result<()> {
    if ctx.json {
        return print_json(items);
    }
    for item in items {
        println!("{}", item);
    }
    Ok(())
}

/// Refuse the change unless one of the caller's keys is a recipient of
/// `path`. No declared keys means no check.
fn ensure_access<R: PassRead + ?Sized>(tx: &R, path: &str, commit: &CommitArgs) -> Result<()> {
    if commit.as_keys.is_empty() {
        return Ok(());
    }
    if !access::can_write(tx, path, &commit.as_keys)? {
        bail!("forbidden: none of the given keys is a recipient of /{}", path);
    }
    Ok(())
}
