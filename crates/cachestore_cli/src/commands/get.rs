//! Get command implementation.

use crate::commands::{open_engine, CommandResult};
use crate::CodecName;
use cachestore_core::{CborCodec, Codec, CoreError, Engine, JsonCodec, Record, Timestamp};
use std::path::Path;
use std::sync::Arc;

/// Runs the get command.
pub fn run(path: &Path, collection: &str, key: &str, codec: CodecName) -> CommandResult<()> {
    let engine = open_engine(path)?;

    match fetch(&engine, collection, key)? {
        Some(record) => {
            let value = decode(&record, codec)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            eprintln!(
                "updated_at={} ({} ago)",
                record.updated_at,
                format_age(record.updated_at)
            );
        }
        None => {
            return Err(format!("Key {key:?} not found in collection {collection:?}").into());
        }
    }

    Ok(())
}

/// Fetches the record stored under `key`.
pub fn fetch(engine: &Arc<Engine>, collection: &str, key: &str) -> CommandResult<Option<Record>> {
    let collection = collection.to_string();
    let key = key.to_string();
    Ok(engine.perform(move |ctx| ctx.fetch_one(&collection, &key))?)
}

/// Decodes a record payload into JSON.
pub fn decode(record: &Record, codec: CodecName) -> Result<serde_json::Value, CoreError> {
    let decoded = match codec {
        CodecName::Cbor => CborCodec::new().decode(&record.payload),
        CodecName::Json => JsonCodec::new().decode(&record.payload),
    };
    decoded.map_err(|e| CoreError::decoding(record.key(), e))
}

fn format_age(updated_at: Timestamp) -> String {
    let age = updated_at.elapsed_at(Timestamp::now()).as_secs();
    match age {
        0..=59 => format!("{age}s"),
        60..=3599 => format!("{}m", age / 60),
        3600..=86_399 => format!("{}h", age / 3600),
        _ => format!("{}d", age / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachestore_core::{DurableStore, Store, StoreConfig};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn decodes_with_chosen_codec() {
        let engine = Engine::open_in_memory().unwrap();
        let cbor = DurableStore::new(Arc::clone(&engine)).unwrap();
        let json_store = DurableStore::open(
            Arc::clone(&engine),
            JsonCodec::new(),
            StoreConfig::new().collection("json"),
        )
        .unwrap();

        let mut value = BTreeMap::new();
        value.insert("name", "ada");
        cbor.save(&value, "user").unwrap();
        json_store.save(&value, "user").unwrap();

        let record = fetch(&engine, "cache", "user").unwrap().unwrap();
        assert_eq!(
            decode(&record, CodecName::Cbor).unwrap(),
            json!({ "name": "ada" })
        );
        assert!(decode(&record, CodecName::Json).is_err());

        let record = fetch(&engine, "json", "user").unwrap().unwrap();
        assert_eq!(
            decode(&record, CodecName::Json).unwrap(),
            json!({ "name": "ada" })
        );
    }

    #[test]
    fn missing_key_is_none() {
        let engine = Engine::open_in_memory().unwrap();
        assert!(fetch(&engine, "cache", "absent").unwrap().is_none());
    }

    #[test]
    fn age_is_human_readable() {
        let now = Timestamp::now().as_millis();
        assert_eq!(format_age(Timestamp::from_millis(now + 10_000)), "0s");
        assert_eq!(format_age(Timestamp::from_millis(now - 120_000)), "2m");
        assert_eq!(format_age(Timestamp::from_millis(now - 7_200_000)), "2h");
    }
}
