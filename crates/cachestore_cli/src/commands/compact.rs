//! Compact command implementation.

use crate::commands::{open_engine, CommandResult};
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> CommandResult<()> {
    let engine = open_engine(path)?;

    println!("Compacting journal at {}", path.display());
    println!();

    let before = engine.stats()?;
    engine.compact()?;
    let after = engine.stats()?;

    println!("Compaction Results:");
    println!("  Live records:  {}", after.records);
    println!(
        "  Entries:       {} -> {}",
        before.journal_entries, after.journal_entries
    );
    println!("  Size before:   {} bytes", before.journal_bytes);
    println!("  Size after:    {} bytes", after.journal_bytes);
    let saved = before.journal_bytes.saturating_sub(after.journal_bytes);
    println!(
        "  Space saved:   {} bytes ({:.1}%)",
        saved,
        if before.journal_bytes > 0 {
            saved as f64 / before.journal_bytes as f64 * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}
