//! Delete command implementation.

use crate::commands::{open_engine, CommandResult};
use cachestore_core::Engine;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runs the delete command.
pub fn run(path: &Path, collection: &str, key: &str) -> CommandResult<()> {
    let engine = open_engine(path)?;

    if delete(&engine, collection, key)? {
        info!(collection, key, "key deleted");
        println!("Deleted {collection}/{key}");
    } else {
        println!("{collection}/{key} not found, nothing to delete");
    }

    Ok(())
}

/// Deletes `key`, returning whether a record was removed.
pub fn delete(engine: &Arc<Engine>, collection: &str, key: &str) -> CommandResult<bool> {
    let collection = collection.to_string();
    let key = key.to_string();
    let removed = engine.perform(move |ctx| {
        let removed = ctx.delete_all(&collection, &key)?;
        ctx.commit()?;
        Ok(removed)
    })?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachestore_core::{DurableStore, Store};

    #[test]
    fn deletes_existing_key_only() {
        let engine = Engine::open_in_memory().unwrap();
        let store = DurableStore::new(Arc::clone(&engine)).unwrap();
        store.save(&1u8, "k").unwrap();

        assert!(delete(&engine, "cache", "k").unwrap());
        assert!(!delete(&engine, "cache", "k").unwrap());
        assert_eq!(store.data::<u8>("k").unwrap(), None);
    }
}
