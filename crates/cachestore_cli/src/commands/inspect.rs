//! Inspect command implementation.

use crate::commands::{open_engine, CommandResult};
use crate::Format;
use cachestore_core::Engine;
use serde::Serialize;
use std::path::Path;

/// Cache inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Cache directory path.
    pub path: String,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Records in the journal, including superseded ones.
    pub journal_entries: u64,
    /// Live records across all collections.
    pub records: usize,
    /// Sequence number of the latest commit.
    pub last_sequence: u64,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of live records.
    pub records: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> CommandResult<()> {
    let engine = open_engine(path)?;
    let result = inspect(path, &engine)?;

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Format::Text => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics from an open engine.
pub fn inspect(path: &Path, engine: &Engine) -> CommandResult<InspectResult> {
    let stats = engine.stats()?;
    let collections = engine
        .collections()
        .into_iter()
        .map(|(name, records)| CollectionStats { name, records })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        journal_bytes: stats.journal_bytes,
        journal_entries: stats.journal_entries,
        records: stats.records,
        last_sequence: stats.last_sequence.as_u64(),
        collections,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("cachestore Cache Inspection");
    println!("===========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Journal:");
    println!("  Size:          {}", format_size(result.journal_bytes));
    println!("  Entries:       {}", result.journal_entries);
    println!("  Last sequence: {}", result.last_sequence);
    println!();
    println!("Records: {}", result.records);

    if !result.collections.is_empty() {
        println!();
        println!("Collections:");
        for collection in &result.collections {
            println!("  {:20} {} records", collection.name, collection.records);
        }
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachestore_core::{Config, Store, StoreConfig, StoreFactory};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn counts_records_per_collection() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), Config::default()).unwrap();
        let cache = StoreFactory::cache_store_with(Arc::clone(&engine), StoreConfig::default())
            .unwrap();
        let tokens = StoreFactory::cache_store_with(
            Arc::clone(&engine),
            StoreConfig::new().collection("tokens"),
        )
        .unwrap();
        cache.save(&1u8, "a").unwrap();
        cache.save(&2u8, "b").unwrap();
        tokens.save("t", "a").unwrap();

        let result = inspect(dir.path(), &engine).unwrap();
        assert_eq!(result.records, 3);
        assert_eq!(result.last_sequence, 3);
        assert_eq!(result.collections.len(), 2);
        assert_eq!(result.collections[0].name, "cache");
        assert_eq!(result.collections[0].records, 2);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
