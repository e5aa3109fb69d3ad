//! Journal writer and streaming reader.

use crate::error::{CoreError, CoreResult};
use crate::journal::record::{
    JournalRecord, JournalRecordType, CRC_SIZE, HEADER_SIZE, JOURNAL_MAGIC, JOURNAL_VERSION,
    MAX_PAYLOAD_SIZE,
};
use cachestore_storage::JournalBackend;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

/// Appends commit batches to a [`JournalBackend`] and reads them back.
pub struct Journal {
    backend: Mutex<Box<dyn JournalBackend>>,
    sync_on_commit: bool,
}

impl Journal {
    /// Creates a journal over `backend`.
    pub fn new(backend: Box<dyn JournalBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends `records` as one contiguous write and makes them durable.
    ///
    /// Returns the offset of the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be encoded or the write, flush or
    /// sync fails. On error nothing in the batch may be considered committed.
    pub fn append_batch(&self, records: &[JournalRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode()?);
        }

        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;
        backend.flush()?;
        if self.sync_on_commit {
            backend.sync()?;
        }
        Ok(offset)
    }

    /// Flushes and syncs the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to flush or sync.
    pub fn sync(&self) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Returns the journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Cuts the journal back to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot truncate.
    pub fn truncate(&self, size: u64) -> CoreResult<()> {
        self.backend.lock().truncate(size)?;
        Ok(())
    }

    /// Reads every byte from `offset` to the end of the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is past the end or the read fails.
    pub fn read_from(&self, offset: u64) -> CoreResult<Vec<u8>> {
        let backend = self.backend.lock();
        let len = backend.size()?.saturating_sub(offset);
        let len = usize::try_from(len)
            .map_err(|_| CoreError::invalid_operation("journal tail too large to read"))?;
        Ok(backend.read_at(offset, len)?)
    }

    /// Replaces the whole journal with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the replacement fails.
    pub fn rewrite(&self, records: &[JournalRecord]) -> CoreResult<()> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode()?);
        }
        self.backend.lock().replace(&data)?;
        debug!(records = records.len(), bytes = data.len(), "journal rewritten");
        Ok(())
    }

    /// Returns a streaming iterator over every record in the journal.
    ///
    /// The backend stays locked while the iterator is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn iter(&self) -> CoreResult<JournalIter<'_>> {
        JournalIter::new(self.backend.lock())
    }
}

/// Streaming iterator over journal records.
///
/// Yields `(offset, record)` pairs. A torn tail ends the iteration without an
/// error; [`JournalIter::torn_tail`] and [`JournalIter::valid_len`] report it
/// afterwards so the caller can cut it off.
pub struct JournalIter<'a> {
    backend: MutexGuard<'a, Box<dyn JournalBackend>>,
    total_size: u64,
    offset: u64,
    torn: bool,
    finished: bool,
}

impl<'a> JournalIter<'a> {
    fn new(backend: MutexGuard<'a, Box<dyn JournalBackend>>) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: 0,
            torn: false,
            finished: false,
        })
    }

    /// Returns `true` if the scan stopped at an incomplete record.
    #[must_use]
    pub fn torn_tail(&self) -> bool {
        self.torn
    }

    /// Length of the journal prefix made of complete records read so far.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.offset
    }

    fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, JournalRecord)>> {
        let start = self.offset;
        if self.remaining() == 0 {
            return Ok(None);
        }
        if self.remaining() < HEADER_SIZE as u64 {
            self.torn = true;
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != JOURNAL_MAGIC {
            return Err(CoreError::journal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > JOURNAL_VERSION {
            return Err(CoreError::journal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = JournalRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::journal_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]);
        if payload_len as usize > MAX_PAYLOAD_SIZE {
            return Err(CoreError::journal_corruption(format!(
                "record length {payload_len} at offset {start} exceeds {MAX_PAYLOAD_SIZE}"
            )));
        }
        let total_len = HEADER_SIZE as u64 + u64::from(payload_len) + CRC_SIZE as u64;
        if self.remaining() < total_len {
            // A torn append is the last write; nothing framed can follow it.
            let rest = self.backend.read_at(start, self.remaining() as usize)?;
            if rest[HEADER_SIZE..]
                .windows(JOURNAL_MAGIC.len())
                .any(|window| window == JOURNAL_MAGIC)
            {
                return Err(CoreError::journal_corruption(format!(
                    "record at offset {start} overruns a later record"
                )));
            }
            self.torn = true;
            return Ok(None);
        }

        let bytes = self.backend.read_at(start, total_len as usize)?;
        let (body, crc) = bytes.split_at(bytes.len() - CRC_SIZE);
        let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let record = JournalRecord::decode_payload(record_type, &body[HEADER_SIZE..])?;
        self.offset += total_len;
        Ok(Some((start, record)))
    }
}

impl Iterator for JournalIter<'_> {
    type Item = CoreResult<(u64, JournalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
