//! cachestore CLI
//!
//! Command-line tools for durable cache directories.
//!
//! # Commands
//!
//! - `inspect` - Display engine statistics and collections
//! - `get` - Decode and print one cached value
//! - `delete` - Delete one key
//! - `clear` - Delete every key of a collection
//! - `compact` - Rewrite the journal down to the live records
//! - `dump-journal` - Dump journal records for debugging

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// cachestore command-line cache tools.
#[derive(Parser)]
#[command(name = "cachestore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cache directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Payload codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CodecName {
    /// CBOR (the store default)
    Cbor,
    /// JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display engine statistics and collections
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Decode and print the value stored under a key
    Get {
        /// Cache key
        key: String,

        /// Collection holding the key
        #[arg(short, long, default_value = "cache")]
        collection: String,

        /// Codec the value was saved with
        #[arg(long, value_enum, default_value = "cbor")]
        codec: CodecName,
    },

    /// Delete one key
    Delete {
        /// Cache key
        key: String,

        /// Collection holding the key
        #[arg(short, long, default_value = "cache")]
        collection: String,
    },

    /// Delete every key of a collection
    Clear {
        /// Collection to clear
        #[arg(short, long, default_value = "cache")]
        collection: String,
    },

    /// Rewrite the journal down to the live records
    Compact,

    /// Dump journal records for debugging
    DumpJournal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Cache path required for inspect")?;
            commands::inspect::run(&path, format)?;
        }
        Commands::Get {
            key,
            collection,
            codec,
        } => {
            let path = cli.path.ok_or("Cache path required for get")?;
            commands::get::run(&path, &collection, &key, codec)?;
        }
        Commands::Delete { key, collection } => {
            let path = cli.path.ok_or("Cache path required for delete")?;
            commands::delete::run(&path, &collection, &key)?;
        }
        Commands::Clear { collection } => {
            let path = cli.path.ok_or("Cache path required for clear")?;
            commands::clear::run(&path, &collection)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Cache path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::DumpJournal { limit, format } => {
            let path = cli.path.ok_or("Cache path required for dump-journal")?;
            commands::dump_journal::run(&path, limit, format)?;
        }
        Commands::Version => {
            println!("cachestore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("cachestore core v{}", cachestore_core::VERSION);
        }
    }

    Ok(())
}
