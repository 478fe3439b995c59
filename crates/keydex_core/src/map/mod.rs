//! Int-to-multi-int map: the hash-bucket index over the value log.
//!
//! Maps a key hash to the candidate ids whose payloads share that hash,
//! plus the id-to-record-offset index. Entries are add-only during normal
//! enumeration; the whole structure is reconstructible from the log, so a
//! stale or missing map is an inconvenience (rebuild), never data loss.

mod durable;
mod memory;

pub use durable::{encode_map_file, DurableMap};
pub use memory::MemoryMap;

use crate::error::CoreResult;
use crate::types::KeyId;

/// Hash-bucket index from key hash to candidate ids, with the parallel
/// id-to-offset index.
///
/// # Contract
///
/// - `get` after `put` within the same session returns a bucket
///   containing the inserted id; no ordering among colliding ids
/// - ids are inserted contiguously in assignment order (1, 2, 3, ...)
/// - entries are never updated or removed
pub trait IntMultiMap: Send + Sync {
    /// Registers `id` in the bucket for `hash`, recording the id's record
    /// offset in the value log.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not the next id in assignment order or
    /// if persisting the entry fails.
    fn put(&mut self, hash: i32, id: KeyId, offset: u64) -> CoreResult<()>;

    /// Returns the candidate ids in the bucket for `hash`.
    fn get(&self, hash: i32) -> &[KeyId];

    /// Returns the value log record offset for `id`, or `None` if the id
    /// was never assigned.
    fn offset_of(&self, id: KeyId) -> Option<u64>;

    /// Number of registered ids.
    fn len(&self) -> usize;

    /// Whether the map holds no ids.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes pending entry writes (no-op for in-memory maps).
    fn flush(&mut self) -> CoreResult<()>;

    /// Flushes and syncs to durable storage (no-op for in-memory maps).
    fn sync(&mut self) -> CoreResult<()>;
}
