//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An ephemeral storage backend holding all bytes in memory.
///
/// Used for tests and for enumerator configurations that rebuild their
/// state from scratch on every open. `flush` and `sync` are no-ops; the
/// content is lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new, empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"one").unwrap(), 0);
        assert_eq!(backend.append(b"two").unwrap(), 3);
        assert_eq!(backend.size().unwrap(), 6);
    }

    #[test]
    fn read_back_exact_bytes() {
        let mut backend = InMemoryBackend::new();
        let offset = backend.append(b"payload").unwrap();
        assert_eq!(backend.read_at(offset, 7).unwrap(), b"payload");
    }

    #[test]
    fn read_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"abc").unwrap();

        assert!(matches!(
            backend.read_at(0, 4),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            backend.read_at(4, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn flush_and_sync_are_noops() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"x").unwrap();
        backend.flush().unwrap();
        backend.sync().unwrap();
        assert_eq!(backend.size().unwrap(), 1);
    }
}
