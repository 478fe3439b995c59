//! Value log writer, reader, and streaming iterator.

use crate::error::{CoreError, CoreResult};
use crate::log::format::{
    check_header, compute_crc32, encode_header, HeaderCheck, HEADER_SIZE, MAX_PAYLOAD_SIZE,
    RECORD_OVERHEAD,
};
use keydex_storage::StorageBackend;

/// Append-only log of codec-encoded key payloads.
///
/// Appends are staged in a fixed-size buffer and pushed to the backend
/// when the buffer fills, before any record that would not fit, and on
/// `flush()`. A record larger than the whole buffer bypasses it and goes
/// to the backend directly, so arbitrarily large payloads are handled
/// without truncation.
///
/// Invariant: a record is always contiguous on one side of the
/// flushed/staged boundary, never split across it. Reads of staged records
/// are served straight from the buffer, so an appended record is readable
/// before it is flushed.
pub struct ValueLog {
    backend: Box<dyn StorageBackend>,
    /// Staged bytes not yet appended to the backend.
    buffer: Vec<u8>,
    buffer_capacity: usize,
    /// Backend-committed length (equals `backend.size()`).
    flushed: u64,
}

impl ValueLog {
    /// Opens a value log over the given backend.
    ///
    /// An empty backend is initialized with a fresh header. Returns
    /// `Ok(None)` if the backend holds a file with a different magic or
    /// version (treated as absent, caller decides whether to recreate).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Open`] if the backend is non-empty but shorter
    /// than a header, or an I/O error.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        buffer_capacity: usize,
    ) -> CoreResult<Option<Self>> {
        let size = backend.size()?;

        if size == 0 {
            backend.append(&encode_header())?;
            backend.flush()?;
        } else {
            if size < HEADER_SIZE {
                return Err(CoreError::open(format!(
                    "value log shorter than its header: {size} bytes"
                )));
            }
            let header = backend.read_at(0, HEADER_SIZE as usize)?;
            if check_header(&header) == HeaderCheck::Mismatch {
                return Ok(None);
            }
        }

        let flushed = backend.size()?;
        Ok(Some(Self {
            backend,
            buffer: Vec::with_capacity(buffer_capacity),
            buffer_capacity,
            flushed,
        }))
    }

    /// Logical committed length, including staged-but-unflushed bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    /// Whether the log contains no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == HEADER_SIZE
    }

    /// Appends a payload and returns its record offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload exceeds the maximum record size or
    /// an I/O error occurs.
    pub fn append(&mut self, payload: &[u8]) -> CoreResult<u64> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CoreError::corrupted(format!(
                "payload too large for a log record: {} bytes",
                payload.len()
            )));
        }

        let framed_len = payload.len() + RECORD_OVERHEAD as usize;

        // Never split a record across the flushed/staged boundary.
        if !self.buffer.is_empty() && self.buffer.len() + framed_len > self.buffer_capacity {
            self.drain_buffer()?;
        }

        if framed_len > self.buffer_capacity {
            // Oversized record: write through, keeping append order.
            self.drain_buffer()?;
            let offset = self.flushed;
            let mut framed = Vec::with_capacity(framed_len);
            frame_record(&mut framed, payload);
            self.backend.append(&framed)?;
            self.flushed += framed_len as u64;
            return Ok(offset);
        }

        let offset = self.flushed + self.buffer.len() as u64;
        frame_record(&mut self.buffer, payload);
        Ok(offset)
    }

    /// Reads the payload of the record starting at `offset`.
    ///
    /// `offset` must be a record offset previously returned by `append`
    /// (or recovered from the map); the length field and CRC are validated
    /// so a wrong offset surfaces as corruption rather than garbage.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] for an out-of-range or malformed
    /// record and [`CoreError::ChecksumMismatch`] on a CRC failure.
    pub fn read(&self, offset: u64) -> CoreResult<Vec<u8>> {
        Ok(self.record_at(offset)?.0)
    }

    /// Reads the record at `offset`, returning its payload and the offset
    /// of the next record.
    pub(crate) fn record_at(&self, offset: u64) -> CoreResult<(Vec<u8>, u64)> {
        let len = self.len();
        if offset < HEADER_SIZE || offset + 4 > len {
            return Err(CoreError::corrupted(format!(
                "record offset {offset} out of range (log length {len})"
            )));
        }

        let len_bytes = self.bytes_at(offset, 4)?;
        let payload_len =
            u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as u64;

        let end = offset + RECORD_OVERHEAD + payload_len;
        if end > len {
            return Err(CoreError::corrupted(format!(
                "record at offset {offset} extends past end of log ({end} > {len})"
            )));
        }

        let rest = self.bytes_at(offset + 4, (payload_len + 4) as usize)?;
        let (payload, crc_bytes) = rest.split_at(payload_len as usize);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed_crc = compute_crc32(payload);

        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        Ok((payload.to_vec(), end))
    }

    /// Reads raw bytes, dispatching between the backend and the staged
    /// buffer. The requested range never straddles the boundary (record
    /// framing guarantees it).
    fn bytes_at(&self, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        if offset >= self.flushed {
            let start = (offset - self.flushed) as usize;
            let end = start + len;
            if end > self.buffer.len() {
                return Err(CoreError::corrupted(format!(
                    "staged read out of range: offset {offset}, len {len}"
                )));
            }
            return Ok(self.buffer[start..end].to_vec());
        }
        Ok(self.backend.read_at(offset, len)?)
    }

    /// Drains the staged buffer into the backend.
    fn drain_buffer(&mut self) -> CoreResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.backend.append(&self.buffer)?;
        self.flushed += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes staged bytes and pending backend writes to the OS.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.drain_buffer()?;
        self.backend.flush()?;
        Ok(())
    }

    /// Flushes and syncs data and metadata to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.drain_buffer()?;
        self.backend.sync()?;
        Ok(())
    }

    /// Returns a streaming iterator over `(record_offset, payload)` pairs.
    ///
    /// Used by the rebuild path and bulk iteration. A truncated tail or a
    /// CRC failure yields an error: the log has no transaction layer above
    /// it, so a half-written record is unrecoverable corruption, not a
    /// clean end of input.
    #[must_use]
    pub fn iter(&self) -> LogIter<'_> {
        LogIter {
            log: self,
            offset: HEADER_SIZE,
            finished: false,
        }
    }
}

impl std::fmt::Debug for ValueLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueLog")
            .field("flushed", &self.flushed)
            .field("staged", &self.buffer.len())
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

/// Appends the framed form of `payload` to `out`.
fn frame_record(out: &mut Vec<u8>, payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&compute_crc32(payload).to_le_bytes());
}

/// Streaming iterator over value log records.
pub struct LogIter<'a> {
    log: &'a ValueLog,
    offset: u64,
    finished: bool,
}

impl Iterator for LogIter<'_> {
    type Item = CoreResult<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.offset >= self.log.len() {
            return None;
        }

        match self.log.record_at(self.offset) {
            Ok((payload, next_offset)) => {
                let record_offset = self.offset;
                self.offset = next_offset;
                Some(Ok((record_offset, payload)))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keydex_storage::InMemoryBackend;

    fn open_log(buffer_capacity: usize) -> ValueLog {
        ValueLog::open(Box::new(InMemoryBackend::new()), buffer_capacity)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn fresh_log_has_header_only() {
        let log = open_log(1024);
        assert_eq!(log.len(), HEADER_SIZE);
        assert!(log.is_empty());
    }

    #[test]
    fn append_and_read_back() {
        let mut log = open_log(1024);

        let o1 = log.append(b"first").unwrap();
        let o2 = log.append(b"second").unwrap();

        assert_eq!(o1, HEADER_SIZE);
        assert!(o2 > o1);
        assert_eq!(log.read(o1).unwrap(), b"first");
        assert_eq!(log.read(o2).unwrap(), b"second");
    }

    #[test]
    fn staged_records_readable_before_flush() {
        let mut log = open_log(64 * 1024);
        let offset = log.append(b"unflushed").unwrap();

        // Nothing drained yet, record is still staged.
        assert_eq!(log.read(offset).unwrap(), b"unflushed");
    }

    #[test]
    fn records_survive_flush() {
        let mut log = open_log(1024);
        let offset = log.append(b"payload").unwrap();
        log.flush().unwrap();
        assert_eq!(log.read(offset).unwrap(), b"payload");
    }

    #[test]
    fn record_filling_most_of_buffer() {
        let capacity = 256;
        let mut log = open_log(capacity);

        // Within 10 bytes of the buffer capacity.
        let payload = vec![0xAA; capacity - 10];
        let offset = log.append(&payload).unwrap();
        assert_eq!(log.read(offset).unwrap(), payload);
    }

    #[test]
    fn record_larger_than_buffer() {
        let capacity = 256;
        let mut log = open_log(capacity);

        let small = log.append(b"small").unwrap();
        let big_payload = vec![0xBB; capacity * 2];
        let big = log.append(&big_payload).unwrap();
        let after = log.append(b"after").unwrap();

        assert_eq!(log.read(small).unwrap(), b"small");
        assert_eq!(log.read(big).unwrap(), big_payload);
        assert_eq!(log.read(after).unwrap(), b"after");
    }

    #[test]
    fn empty_payload_roundtrips() {
        let mut log = open_log(1024);
        let offset = log.append(b"").unwrap();
        assert_eq!(log.read(offset).unwrap(), b"");
    }

    #[test]
    fn iter_yields_records_in_append_order() {
        let mut log = open_log(128);

        let payloads: Vec<Vec<u8>> = (0..20).map(|i| vec![i as u8; 10 + i]).collect();
        let offsets: Vec<u64> = payloads
            .iter()
            .map(|p| log.append(p).unwrap())
            .collect();

        let scanned: Vec<(u64, Vec<u8>)> = log.iter().map(|r| r.unwrap()).collect();
        assert_eq!(scanned.len(), payloads.len());
        for (i, (offset, payload)) in scanned.iter().enumerate() {
            assert_eq!(*offset, offsets[i]);
            assert_eq!(payload, &payloads[i]);
        }
    }

    #[test]
    fn iter_empty_log() {
        let log = open_log(1024);
        assert_eq!(log.iter().count(), 0);
    }

    #[test]
    fn corrupted_crc_detected() {
        let mut backend = InMemoryBackend::new();
        backend.append(&encode_header()).unwrap();
        // Record with a deliberately wrong CRC.
        backend.append(&3u32.to_le_bytes()).unwrap();
        backend.append(b"abc").unwrap();
        backend.append(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();

        let log = ValueLog::open(Box::new(backend), 1024).unwrap().unwrap();
        let result = log.read(HEADER_SIZE);
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn truncated_record_is_fatal_to_scan() {
        let mut backend = InMemoryBackend::new();
        backend.append(&encode_header()).unwrap();
        // Length field promises more bytes than the file holds.
        backend.append(&100u32.to_le_bytes()).unwrap();
        backend.append(b"short").unwrap();

        let log = ValueLog::open(Box::new(backend), 1024).unwrap().unwrap();
        let results: Vec<_> = log.iter().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn foreign_file_reported_as_absent() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"not a keydex log, definitely").unwrap();

        let result = ValueLog::open(Box::new(backend), 1024).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn short_file_fails_open() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"KL").unwrap();

        let result = ValueLog::open(Box::new(backend), 1024);
        assert!(matches!(result, Err(CoreError::Open { .. })));
    }

    #[test]
    fn wrong_offset_detected() {
        let mut log = open_log(1024);
        log.append(b"some payload bytes").unwrap();

        // Offset into the middle of a record: either the length check or
        // the CRC rejects it.
        let result = log.read(HEADER_SIZE + 2);
        assert!(result.is_err());
    }

    mod props {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        proptest! {
            // Varied payload sizes against varied buffer capacities hit
            // every staging case: fits, forces a drain, bypasses.
            #[test]
            fn scan_sees_every_append(
                payloads in vec(vec(any::<u8>(), 0..200), 0..30),
                capacity in 32usize..256,
            ) {
                let mut log = open_log(capacity);
                let offsets: Vec<u64> = payloads
                    .iter()
                    .map(|p| log.append(p).unwrap())
                    .collect();

                let scanned: Vec<(u64, Vec<u8>)> =
                    log.iter().map(|r| r.unwrap()).collect();
                prop_assert_eq!(scanned.len(), payloads.len());
                for (i, (offset, payload)) in scanned.iter().enumerate() {
                    prop_assert_eq!(*offset, offsets[i]);
                    prop_assert_eq!(payload, &payloads[i]);
                }
            }
        }
    }
}
