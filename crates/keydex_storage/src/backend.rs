//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store backing a keydex file.
///
/// Backends are append-only from the writer's point of view: bytes are
/// added at the end and never rewritten. Already-committed regions may be
/// read concurrently with appends (the caller serializes writers).
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush`, appended data survives process termination; after
///   `sync`, it also survives OS-level buffering
/// - implementations are `Send + Sync`
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the requested range
    /// extends beyond the committed size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data at the end of the store and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage.
    ///
    /// Stronger than `flush`: after this returns, the data survives an OS
    /// crash as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current committed size in bytes.
    ///
    /// This is the offset the next `append` will write at.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}
