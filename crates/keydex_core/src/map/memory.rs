//! Pure in-memory int-to-multi-int map.

use crate::error::{CoreError, CoreResult};
use crate::map::IntMultiMap;
use crate::types::KeyId;
use std::collections::HashMap;

/// In-memory map variant, rebuilt from the value log on every open.
///
/// Also serves as the in-memory core of [`super::DurableMap`].
#[derive(Debug, Default)]
pub struct MemoryMap {
    /// Hash bucket to colliding candidate ids.
    buckets: HashMap<i32, Vec<KeyId>>,
    /// Record offset per id, indexed by id - 1.
    offsets: Vec<u64>,
}

impl MemoryMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntMultiMap for MemoryMap {
    fn put(&mut self, hash: i32, id: KeyId, offset: u64) -> CoreResult<()> {
        if id != KeyId::from_index(self.offsets.len()) {
            return Err(CoreError::corrupted(format!(
                "id {id} inserted out of assignment order (expected {})",
                KeyId::from_index(self.offsets.len())
            )));
        }
        self.offsets.push(offset);
        self.buckets.entry(hash).or_default().push(id);
        Ok(())
    }

    fn get(&self, hash: i32) -> &[KeyId] {
        self.buckets.get(&hash).map_or(&[], Vec::as_slice)
    }

    fn offset_of(&self, id: KeyId) -> Option<u64> {
        if id.is_null() {
            return None;
        }
        self.offsets.get(id.index()).copied()
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn flush(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> CoreResult<()> {
        Ok(())
    }
}
