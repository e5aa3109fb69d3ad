//! Append-only journal behind the durable engine.
//!
//! Every commit is appended as one contiguous batch:
//! `Begin`, then one `Upsert`/`Delete` per changed record, then `Commit`.
//!
//! ## Record Format
//!
//! ```text
//! | magic "CJNL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery Policy
//!
//! - A truncated header or payload at the end of the journal is a torn write
//!   from a crash mid-append. It ends the scan cleanly, is copied to
//!   `journal.log.torn` for file-backed caches, and is cut off.
//! - A bad checksum, bad magic, unknown type or unsupported version is
//!   corruption and fails the open. So is a length field above
//!   [`MAX_PAYLOAD_SIZE`], or one that runs over a later record header.
//! - Only transactions whose `Commit` record made it to disk are applied.

mod record;
mod writer;

pub use record::{
    JournalRecord, JournalRecordType, JOURNAL_MAGIC, JOURNAL_VERSION, MAX_PAYLOAD_SIZE,
};
pub use writer::{Journal, JournalIter};
