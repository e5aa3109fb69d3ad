//! Clear command implementation.

use crate::commands::{open_engine, CommandResult};
use cachestore_core::Engine;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runs the clear command.
pub fn run(path: &Path, collection: &str) -> CommandResult<()> {
    let engine = open_engine(path)?;
    let removed = clear(&engine, collection)?;
    info!(collection, removed, "collection cleared");
    println!("Removed {removed} records from {collection}");
    Ok(())
}

/// Removes every record of `collection`, returning how many were removed.
pub fn clear(engine: &Arc<Engine>, collection: &str) -> CommandResult<usize> {
    let collection = collection.to_string();
    Ok(engine.perform(move |ctx| {
        let removed = ctx.clear_collection(&collection)?;
        ctx.commit()?;
        Ok(removed)
    })?)
}
