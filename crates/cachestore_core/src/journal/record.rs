//! Journal record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::record::RecordKey;
use crate::types::{SequenceNumber, Timestamp, TransactionId};
use bytes::Bytes;

/// Magic bytes opening every journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"CJNL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Envelope header: magic (4) + version (2) + type (1) + length (4).
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub(crate) const CRC_SIZE: usize = 4;

/// Largest record payload the journal accepts.
///
/// A length field above this bound is corruption, never a torn write.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Type tag of a journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalRecordType {
    /// Start of a transaction.
    Begin = 1,
    /// Insert or overwrite a record.
    Upsert = 2,
    /// Remove a record.
    Delete = 3,
    /// End of a transaction.
    Commit = 4,
}

impl JournalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Upsert),
            3 => Some(Self::Delete),
            4 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One entry of the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Start of a transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Insert or overwrite a record.
    Upsert {
        /// Transaction ID.
        txid: TransactionId,
        /// Record identity.
        id: RecordKey,
        /// Write time.
        updated_at: Timestamp,
        /// Codec payload.
        payload: Bytes,
    },

    /// Remove a record.
    Delete {
        /// Transaction ID.
        txid: TransactionId,
        /// Record identity.
        id: RecordKey,
    },

    /// End of a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to the commit.
        sequence: SequenceNumber,
    },
}

impl JournalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> JournalRecordType {
        match self {
            Self::Begin { .. } => JournalRecordType::Begin,
            Self::Upsert { .. } => JournalRecordType::Upsert,
            Self::Delete { .. } => JournalRecordType::Delete,
            Self::Commit { .. } => JournalRecordType::Commit,
        }
    }

    /// Returns the transaction this record belongs to.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::Upsert { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a collection name, key or payload is too long for
    /// its length field.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Begin { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }
            Self::Upsert {
                txid,
                id,
                updated_at,
                payload,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&updated_at.as_millis().to_le_bytes());
                put_record_key(&mut buf, id)?;
                put_u32_len(&mut buf, payload.len(), "payload")?;
                buf.extend_from_slice(payload);
            }
            Self::Delete { txid, id } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                put_record_key(&mut buf, id)?;
            }
            Self::Commit { txid, sequence } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::JournalCorruption`] if the payload is short, has
    /// trailing bytes or holds non UTF-8 names.
    pub fn decode_payload(record_type: JournalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader::new(payload);

        let record = match record_type {
            JournalRecordType::Begin => Self::Begin {
                txid: TransactionId::new(reader.u64()?),
            },
            JournalRecordType::Upsert => {
                let txid = TransactionId::new(reader.u64()?);
                let updated_at = Timestamp::from_millis(reader.u64()?);
                let id = reader.record_key()?;
                let len = reader.u32()? as usize;
                let payload = Bytes::copy_from_slice(reader.take(len)?);
                Self::Upsert {
                    txid,
                    id,
                    updated_at,
                    payload,
                }
            }
            JournalRecordType::Delete => Self::Delete {
                txid: TransactionId::new(reader.u64()?),
                id: reader.record_key()?,
            },
            JournalRecordType::Commit => Self::Commit {
                txid: TransactionId::new(reader.u64()?),
                sequence: SequenceNumber::new(reader.u64()?),
            },
        };

        reader.finish(record_type)?;
        Ok(record)
    }

    /// Serializes the record with its envelope and checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CoreError::invalid_operation(format!(
                "journal record payload of {} bytes exceeds {MAX_PAYLOAD_SIZE}",
                payload.len()
            )));
        }
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_operation("journal record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

fn put_record_key(buf: &mut Vec<u8>, id: &RecordKey) -> CoreResult<()> {
    let collection_len = u16::try_from(id.collection.len())
        .map_err(|_| CoreError::invalid_operation("collection name too long"))?;
    buf.extend_from_slice(&collection_len.to_le_bytes());
    buf.extend_from_slice(id.collection.as_bytes());
    put_u32_len(buf, id.key.len(), "key")?;
    buf.extend_from_slice(id.key.as_bytes());
    Ok(())
}

fn put_u32_len(buf: &mut Vec<u8>, len: usize, what: &str) -> CoreResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| CoreError::invalid_operation(format!("{what} exceeds 4 GiB")))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, cursor: 0 }
    }

    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self.cursor.saturating_add(len);
        let slice = self
            .payload
            .get(self.cursor..end)
            .ok_or_else(|| CoreError::journal_corruption("unexpected end of payload"))?;
        self.cursor = end;
        Ok(slice)
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CoreError::journal_corruption("invalid u64"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| CoreError::journal_corruption("invalid u32"))?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn u16(&mut self) -> CoreResult<u16> {
        let bytes: [u8; 2] = self
            .take(2)?
            .try_into()
            .map_err(|_| CoreError::journal_corruption("invalid u16"))?;
        Ok(u16::from_le_bytes(bytes))
    }

    fn text(&mut self, len: usize) -> CoreResult<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CoreError::journal_corruption("name is not valid UTF-8"))
    }

    fn record_key(&mut self) -> CoreResult<RecordKey> {
        let collection_len = self.u16()? as usize;
        let collection = self.text(collection_len)?;
        let key_len = self.u32()? as usize;
        let key = self.text(key_len)?;
        Ok(RecordKey { collection, key })
    }

    fn finish(&self, record_type: JournalRecordType) -> CoreResult<()> {
        if self.cursor != self.payload.len() {
            return Err(CoreError::journal_corruption(format!(
                "trailing bytes in {:?} record: expected {} bytes, got {}",
                record_type,
                self.cursor,
                self.payload.len()
            )));
        }
        Ok(())
    }
}
