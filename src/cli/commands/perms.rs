//! recipients, affected and decryptable commands

use anyhow::{Context as _, Result};

use super::print_lines;
use crate::cli::Context;
use crate::gpg::{PacketParser, RecipientParser};
use crate::store::PassRead;

/// Effective recipients of a path.
pub fn recipients(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;
    let list = tx.recipients(path)?;
    print_lines(ctx, list.as_slice())
}

/// Files that must be re-encrypted if `path`'s recipients change.
pub fn affected(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;
    let files = tx.affected_files(path)?;
    print_lines(ctx, &files)
}

/// Key IDs recorded in the ciphertext of a stored file.
pub fn decryptable(ctx: &Context, path: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;
    let contents = tx.get(path)?;
    let ids = PacketParser
        .recipients(&contents)
        .with_context(|| format!("Failed to read OpenPGP packets of /{}", path))?;
    print_lines(ctx, &ids)
}
