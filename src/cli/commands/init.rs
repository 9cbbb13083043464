//! init command - Create or open the store and report where it lives

use anyhow::Result;
use serde_json::json;

use super::print_json;
use crate::cli::Context;

/// Open the store, bootstrapping it if needed.
pub fn init(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let tx = store.begin()?;

    if ctx.json {
        return print_json(&json!({
            "root": store.root(),
            "branch": store.branch().as_str(),
            "commit": tx.commit_id().as_str(),
        }));
    }

    println!(
        "Password store at {} ({} @ {})",
        store.root().display(),
        store.branch(),
        tx.commit_id().short(7)
    );
    Ok(())
}
