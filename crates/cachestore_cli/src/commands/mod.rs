//! CLI command implementations.

pub mod clear;
pub mod compact;
pub mod delete;
pub mod dump_journal;
pub mod get;
pub mod inspect;

use cachestore_core::{CacheDir, Config, Engine};
use std::path::Path;
use std::sync::Arc;

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Opens an existing cache directory.
pub fn open_engine(path: &Path) -> CommandResult<Arc<Engine>> {
    if !path.join(CacheDir::JOURNAL_FILE).exists() {
        return Err(format!("No cache found at {}", path.display()).into());
    }
    let config = Config::new().create_if_missing(false);
    Ok(Engine::open(path, config)?)
}
