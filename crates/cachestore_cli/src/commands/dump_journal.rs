//! Dump journal command implementation.

use crate::commands::{open_engine, CommandResult};
use crate::Format;
use cachestore_core::journal::JournalRecord;
use cachestore_core::Engine;
use serde::Serialize;
use std::path::Path;

/// Journal record representation for output.
#[derive(Debug, Serialize)]
pub struct JournalRecordInfo {
    /// Offset in the journal file.
    pub offset: u64,
    /// Record type.
    pub record_type: &'static str,
    /// Transaction ID.
    pub txid: u64,
    /// Collection (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Key (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Sequence number (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Write time in milliseconds since the Unix epoch (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
    /// Payload size in bytes (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
}

impl JournalRecordInfo {
    fn new(offset: u64, record: &JournalRecord) -> Self {
        let mut info = Self {
            offset,
            record_type: "",
            txid: record.txid().as_u64(),
            collection: None,
            key: None,
            sequence: None,
            updated_at: None,
            payload_size: None,
        };

        match record {
            JournalRecord::Begin { .. } => info.record_type = "BEGIN",
            JournalRecord::Upsert {
                id,
                updated_at,
                payload,
                ..
            } => {
                info.record_type = "UPSERT";
                info.collection = Some(id.collection.clone());
                info.key = Some(id.key.clone());
                info.updated_at = Some(updated_at.as_millis());
                info.payload_size = Some(payload.len());
            }
            JournalRecord::Delete { id, .. } => {
                info.record_type = "DELETE";
                info.collection = Some(id.collection.clone());
                info.key = Some(id.key.clone());
            }
            JournalRecord::Commit { sequence, .. } => {
                info.record_type = "COMMIT";
                info.sequence = Some(sequence.as_u64());
            }
        }
        info
    }
}

/// Runs the dump-journal command.
pub fn run(path: &Path, limit: Option<usize>, format: Format) -> CommandResult<()> {
    let engine = open_engine(path)?;
    let records = read_journal(&engine, limit)?;

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Format::Text => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads up to `limit` journal records.
pub fn read_journal(engine: &Engine, limit: Option<usize>) -> CommandResult<Vec<JournalRecordInfo>> {
    Ok(engine
        .journal_records()?
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(offset, record)| JournalRecordInfo::new(*offset, record))
        .collect())
}

fn print_text_output(records: &[JournalRecordInfo]) {
    println!("Journal Records ({} total)", records.len());
    println!("======================");
    println!();

    for record in records {
        print!("[{:08}] {:7} txid={}", record.offset, record.record_type, record.txid);

        if let Some(seq) = record.sequence {
            print!(" seq={seq}");
        }
        if let (Some(collection), Some(key)) = (&record.collection, &record.key) {
            print!(" key={collection}/{key}");
        }
        if let Some(size) = record.payload_size {
            print!(" payload={size} bytes");
        }

        println!();
    }
}
