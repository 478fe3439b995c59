//! Durable int-to-multi-int map.
//!
//! ```text
//! header:  magic "KMAP" (4) | version u16 LE (2) | reserved zeros (10)
//! entry:   key hash i32 LE (4) | id u32 LE (4) | record offset u64 LE (8)
//! ```
//!
//! Entries are appended in id order, so the file doubles as the persisted
//! id-to-offset index: the n-th entry belongs to id n. The file is an
//! optimization, never the source of truth; any validation failure on
//! load means "stale" and triggers a rebuild from the value log.

use crate::error::CoreResult;
use crate::log::HEADER_SIZE as LOG_HEADER_SIZE;
use crate::map::{IntMultiMap, MemoryMap};
use crate::types::KeyId;
use keydex_storage::StorageBackend;

/// Magic bytes identifying a keydex map file.
pub const MAP_MAGIC: [u8; 4] = *b"KMAP";

/// Current map file format version.
pub const MAP_VERSION: u16 = 1;

/// Fixed file header size.
pub const MAP_HEADER_SIZE: u64 = 16;

/// Size of one persisted entry.
pub const ENTRY_SIZE: u64 = 16;

fn encode_map_header() -> [u8; MAP_HEADER_SIZE as usize] {
    let mut header = [0u8; MAP_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(&MAP_MAGIC);
    header[4..6].copy_from_slice(&MAP_VERSION.to_le_bytes());
    header
}

fn encode_entry(hash: i32, id: KeyId, offset: u64) -> [u8; ENTRY_SIZE as usize] {
    let mut entry = [0u8; ENTRY_SIZE as usize];
    entry[0..4].copy_from_slice(&hash.to_le_bytes());
    entry[4..8].copy_from_slice(&id.as_u32().to_le_bytes());
    entry[8..16].copy_from_slice(&offset.to_le_bytes());
    entry
}

/// Builds the byte content of a complete map file from `(hash, offset)`
/// pairs in id order. Used by the rebuild path together with the atomic
/// map replacement in [`crate::dir::StorageDir::replace_map`].
#[must_use]
pub fn encode_map_file(entries: &[(i32, u64)]) -> Vec<u8> {
    let mut content =
        Vec::with_capacity((MAP_HEADER_SIZE + ENTRY_SIZE * entries.len() as u64) as usize);
    content.extend_from_slice(&encode_map_header());
    for (index, &(hash, offset)) in entries.iter().enumerate() {
        content.extend_from_slice(&encode_entry(hash, KeyId::from_index(index), offset));
    }
    content
}

/// Map variant persisted to an append-only entry file.
///
/// Lookups are served from the in-memory [`MemoryMap`]; `put` appends the
/// entry to the backend as well, and `flush`/`sync` make it durable.
pub struct DurableMap {
    memory: MemoryMap,
    backend: Box<dyn StorageBackend>,
}

impl DurableMap {
    /// Loads a durable map from its backend, validating it against the
    /// value log's current length.
    ///
    /// An empty backend is initialized with a fresh header. Returns
    /// `Ok(None)` when the file is stale or foreign: wrong magic or
    /// version, misaligned entry region, non-contiguous ids, or an offset
    /// outside the log. The caller rebuilds from the log in that case.
    ///
    /// # Errors
    ///
    /// Returns an error only on I/O failure.
    pub fn load(mut backend: Box<dyn StorageBackend>, log_len: u64) -> CoreResult<Option<Self>> {
        let size = backend.size()?;

        if size == 0 {
            backend.append(&encode_map_header())?;
            backend.flush()?;
            return Ok(Some(Self {
                memory: MemoryMap::new(),
                backend,
            }));
        }

        if size < MAP_HEADER_SIZE {
            return Ok(None);
        }

        let header = backend.read_at(0, MAP_HEADER_SIZE as usize)?;
        if header[0..4] != MAP_MAGIC
            || u16::from_le_bytes([header[4], header[5]]) != MAP_VERSION
        {
            return Ok(None);
        }

        let body_len = size - MAP_HEADER_SIZE;
        if body_len % ENTRY_SIZE != 0 {
            return Ok(None);
        }

        let body = backend.read_at(MAP_HEADER_SIZE, body_len as usize)?;
        let mut memory = MemoryMap::new();

        for (index, entry) in body.chunks_exact(ENTRY_SIZE as usize).enumerate() {
            let hash = i32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
            let id = KeyId::new(u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]));
            let offset = u64::from_le_bytes([
                entry[8], entry[9], entry[10], entry[11], entry[12], entry[13], entry[14],
                entry[15],
            ]);

            if id != KeyId::from_index(index) {
                return Ok(None);
            }
            if offset < LOG_HEADER_SIZE || offset >= log_len {
                return Ok(None);
            }

            memory.put(hash, id, offset)?;
        }

        Ok(Some(Self { memory, backend }))
    }
}

impl IntMultiMap for DurableMap {
    fn put(&mut self, hash: i32, id: KeyId, offset: u64) -> CoreResult<()> {
        self.memory.put(hash, id, offset)?;
        self.backend.append(&encode_entry(hash, id, offset))?;
        Ok(())
    }

    fn get(&self, hash: i32) -> &[KeyId] {
        self.memory.get(hash)
    }

    fn offset_of(&self, id: KeyId) -> Option<u64> {
        self.memory.offset_of(id)
    }

    fn len(&self) -> usize {
        self.memory.len()
    }

    fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for DurableMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableMap")
            .field("len", &self.memory.len())
            .finish_non_exhaustive()
    }
}
