//! Durable key enumerator: the public facade over log, map, and codec.

use crate::cache::ValueCache;
use crate::config::{EnumeratorConfig, MapKind};
use crate::dir::StorageDir;
use crate::error::{CoreError, CoreResult};
use crate::log::ValueLog;
use crate::map::{encode_map_file, DurableMap, IntMultiMap, MemoryMap};
use crate::types::KeyId;
use keydex_codec::KeyCodec;
use keydex_storage::{FileBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutable storage state behind the enumerator's lock.
struct EnumeratorState {
    log: ValueLog,
    map: Box<dyn IntMultiMap>,
}

/// Assigns stable positive integer ids to keys and resolves them back.
///
/// The append-only value log is the source of truth: a key's id is the
/// 1-based ordinal of its record in the log. The int-to-multi-int map is a
/// derived index and is rebuilt from the log whenever it is missing, stale,
/// or flagged as corrupted.
///
/// All operations take `&self`; interior locking makes the enumerator safe
/// to share across threads. Two threads enumerating the same new key
/// concurrently observe the same id.
pub struct DurableEnumerator<K, C> {
    codec: C,
    state: RwLock<EnumeratorState>,
    cache: Option<ValueCache<K>>,
    corrupted: AtomicBool,
    closed: AtomicBool,
    /// Taken (and thereby unlocked) by `close`; `None` for backend-only
    /// enumerators.
    dir: Mutex<Option<StorageDir>>,
    config: EnumeratorConfig,
}

impl<K, C> DurableEnumerator<K, C>
where
    K: Eq + Clone,
    C: KeyCodec<K>,
{
    /// Opens (or creates) an enumerator in the given storage directory.
    ///
    /// A value log with a foreign magic or version is treated as absent
    /// and recreated empty, together with its map. A stale map, or a
    /// previously persisted corruption marker, triggers a rebuild from the
    /// log when [`EnumeratorConfig::rebuild_if_inconsistent`] allows it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Locked`] if another process holds the
    /// directory, [`CoreError::Corrupted`] if the log itself does not scan
    /// cleanly during a rebuild, and [`CoreError::Open`] if a rebuild is
    /// needed but disabled.
    pub fn open(path: &Path, codec: C, config: EnumeratorConfig) -> CoreResult<Self> {
        let dir = StorageDir::open(path)?;
        let log = Self::open_log(&dir, &config)?;
        let marker = dir.has_corruption_marker();

        let map: Box<dyn IntMultiMap> = match config.map_kind {
            MapKind::InMemory => Box::new(Self::rebuild_memory_map(&log, &codec)?),
            MapKind::Durable => Self::open_durable_map(&dir, &log, &codec, &config, marker)?,
        };

        // Any inconsistency the marker flagged has been repaired above.
        dir.clear_corruption_marker()?;

        tracing::debug!(
            path = %path.display(),
            keys = map.len(),
            "opened enumerator"
        );

        Ok(Self {
            codec,
            state: RwLock::new(EnumeratorState { log, map }),
            cache: ValueCache::new(config.value_cache_capacity),
            corrupted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            dir: Mutex::new(Some(dir)),
            config,
        })
    }

    /// Opens an enumerator over an arbitrary storage backend, without a
    /// directory, lock file, or durable map. Intended for ephemeral and
    /// in-memory use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Open`] if the backend holds foreign data, or
    /// [`CoreError::Corrupted`] if its log does not scan cleanly.
    pub fn with_backend(
        backend: Box<dyn StorageBackend>,
        codec: C,
        config: EnumeratorConfig,
    ) -> CoreResult<Self> {
        let log = ValueLog::open(backend, config.append_buffer_size)?
            .ok_or_else(|| CoreError::open("backend holds a foreign or incompatible log"))?;
        let map = Box::new(Self::rebuild_memory_map(&log, &codec)?);

        Ok(Self {
            codec,
            state: RwLock::new(EnumeratorState { log, map }),
            cache: ValueCache::new(config.value_cache_capacity),
            corrupted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            dir: Mutex::new(None),
            config,
        })
    }

    fn open_log(dir: &StorageDir, config: &EnumeratorConfig) -> CoreResult<ValueLog> {
        let backend = FileBackend::open(&dir.log_path())?;
        if let Some(log) = ValueLog::open(Box::new(backend), config.append_buffer_size)? {
            return Ok(log);
        }

        tracing::warn!(
            path = %dir.log_path().display(),
            "value log has a foreign magic or version, recreating empty"
        );
        dir.remove_log()?;
        // The map indexed the old log; it goes too.
        dir.remove_map()?;

        let backend = FileBackend::open(&dir.log_path())?;
        ValueLog::open(Box::new(backend), config.append_buffer_size)?
            .ok_or_else(|| CoreError::open("could not initialize a fresh value log"))
    }

    fn open_durable_map(
        dir: &StorageDir,
        log: &ValueLog,
        codec: &C,
        config: &EnumeratorConfig,
        marker: bool,
    ) -> CoreResult<Box<dyn IntMultiMap>> {
        if marker {
            tracing::warn!("corruption marker present, map will be rebuilt");
        } else {
            let backend = FileBackend::open(&dir.map_path())?;
            match DurableMap::load(Box::new(backend), log.len())? {
                Some(map) if map_matches_log(&map, log) => return Ok(Box::new(map)),
                Some(_) => tracing::warn!("map is stale relative to the value log"),
                None => tracing::warn!("map file is absent, foreign, or malformed"),
            }
        }

        if !config.rebuild_if_inconsistent {
            return Err(CoreError::open(
                "map is inconsistent and rebuild_if_inconsistent is disabled",
            ));
        }

        let entries = scan_log_entries(log, codec)?;
        dir.replace_map(&encode_map_file(&entries))?;

        let backend = FileBackend::open(&dir.map_path())?;
        let map = DurableMap::load(Box::new(backend), log.len())?
            .ok_or_else(|| CoreError::corrupted("freshly rebuilt map failed validation"))?;

        tracing::info!(keys = map.len(), "map rebuilt from value log");
        Ok(Box::new(map))
    }

    fn rebuild_memory_map(log: &ValueLog, codec: &C) -> CoreResult<MemoryMap> {
        let mut map = MemoryMap::new();
        for (hash, offset) in scan_log_entries(log, codec)? {
            let id = KeyId::from_index(map.len());
            map.put(hash, id, offset)?;
        }
        Ok(map)
    }

    /// Returns the stable id for `key`, assigning a fresh one if the key
    /// has never been seen. Idempotent: the same key always yields the
    /// same id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] if two distinct stored records
    /// decode to the same key, and codec or I/O errors otherwise.
    pub fn enumerate(&self, key: &K) -> CoreResult<KeyId> {
        self.ensure_open()?;
        let hash = self.codec.key_hash(key)?;

        {
            let state = self.state.read_recursive();
            if let Some(id) = self.lookup_in(&state, hash, key)? {
                return Ok(id);
            }
        }

        let mut state = self.state.write();
        // Re-check: another thread may have appended this key between the
        // read and write locks.
        if let Some(id) = self.lookup_in(&state, hash, key)? {
            return Ok(id);
        }

        let encoded = self.codec.encode(key)?;
        let offset = state.log.append(&encoded)?;
        let id = KeyId::from_index(state.map.len());
        if let Err(e) = state.map.put(hash, id, offset) {
            // The record is already in the log but has no map entry. The
            // rebuild on the next open re-indexes it.
            self.flag_corruption(&format!("map entry for {id} not recorded: {e}"));
            return Err(e);
        }
        Ok(id)
    }

    /// Returns the id for `key` without assigning one: `Ok(None)` means
    /// the key has never been enumerated. Never writes.
    ///
    /// # Errors
    ///
    /// Same error conditions as [`enumerate`](Self::enumerate), minus
    /// anything write-related.
    pub fn try_enumerate(&self, key: &K) -> CoreResult<Option<KeyId>> {
        self.ensure_open()?;
        let hash = self.codec.key_hash(key)?;
        let state = self.state.read_recursive();
        self.lookup_in(&state, hash, key)
    }

    /// Scans the bucket for `hash` and returns the id whose stored payload
    /// decodes to `key`, if any.
    fn lookup_in(
        &self,
        state: &EnumeratorState,
        hash: i32,
        key: &K,
    ) -> CoreResult<Option<KeyId>> {
        let mut found = None;
        for &id in state.map.get(hash) {
            let offset = state.map.offset_of(id).ok_or_else(|| {
                CoreError::corrupted(format!("bucket references unknown id {id}"))
            })?;
            let payload = state.log.read(offset)?;

            match self.codec.decode(&payload) {
                Ok(candidate) if &candidate == key => {
                    if let Some(prev) = found {
                        return Err(CoreError::corrupted(format!(
                            "ids {prev} and {id} decode to the same key"
                        )));
                    }
                    found = Some(id);
                }
                Ok(_) => {}
                Err(e) => {
                    // A record we wrote no longer decodes. Skip it as a
                    // candidate but remember the evidence.
                    self.flag_corruption(&format!("record for {id} does not decode: {e}"));
                }
            }
        }
        Ok(found)
    }

    /// Resolves an id back to its key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] for the null sentinel or an
    /// unassigned id, [`CoreError::ChecksumMismatch`] or
    /// [`CoreError::Corrupted`] if the record is damaged.
    pub fn value_of(&self, id: KeyId) -> CoreResult<K> {
        self.ensure_open()?;
        if id.is_null() {
            return Err(CoreError::InvalidId { id: id.as_u32() });
        }

        if let Some(cache) = &self.cache {
            if let Some(key) = cache.get(id) {
                return Ok(key);
            }
        }

        let payload = {
            let state = self.state.read_recursive();
            let offset = state
                .map
                .offset_of(id)
                .ok_or(CoreError::InvalidId { id: id.as_u32() })?;
            state.log.read(offset)?
        };

        let key = self.codec.decode(&payload).map_err(|e| {
            self.flag_corruption(&format!("record for {id} does not decode: {e}"));
            CoreError::from(e)
        })?;

        if let Some(cache) = &self.cache {
            cache.insert(id, key.clone());
        }
        Ok(key)
    }

    /// Calls `f` for every enumerated key in id order. Iteration stops
    /// early when `f` returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log does not scan cleanly or a record does
    /// not decode.
    pub fn for_each<F>(&self, mut f: F) -> CoreResult<()>
    where
        F: FnMut(KeyId, &K) -> bool,
    {
        self.ensure_open()?;
        let state = self.state.read_recursive();
        for (index, record) in state.log.iter().enumerate() {
            let (_, payload) = record?;
            let id = KeyId::from_index(index);
            let key = self.codec.decode(&payload).map_err(|e| {
                self.flag_corruption(&format!("record for {id} does not decode: {e}"));
                CoreError::from(e)
            })?;
            if !f(id, &key) {
                break;
            }
        }
        Ok(())
    }

    /// Number of enumerated keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read_recursive().map.len()
    }

    /// Whether no keys have been enumerated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flags the storage as corrupted so the next open rebuilds the map.
    ///
    /// Takes no locks: safe to call from error paths that already hold
    /// read access, including concurrently from multiple threads.
    pub fn mark_corrupted(&self) {
        self.flag_corruption("marked corrupted by caller");
    }

    /// Whether corruption has been observed in this session.
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        self.corrupted.load(Ordering::SeqCst)
    }

    fn flag_corruption(&self, reason: &str) {
        if self.corrupted.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!(reason, "enumerator flagged corrupted");

        // Best effort: the in-memory flag stands even if the marker write
        // fails, and a missing marker only costs a consistency check on
        // the next open.
        if let Some(dir) = self.dir.lock().as_ref() {
            if let Err(e) = dir.write_corruption_marker() {
                tracing::warn!(error = %e, "could not persist corruption marker");
            }
        }
    }

    /// Flushes pending appends to the OS, and to durable storage when
    /// [`EnumeratorConfig::sync_on_force`] is set.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if flushing or syncing fails.
    pub fn force(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write();
        state.log.flush()?;
        state.map.flush()?;
        if self.config.sync_on_force {
            state.log.sync()?;
            state.map.sync()?;
        }
        Ok(())
    }

    /// Flushes, syncs, and closes the enumerator, releasing the storage
    /// directory's lock so the path can be reopened immediately.
    /// Idempotent; subsequent operations fail with [`CoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final flush or sync fails; the
    /// enumerator counts as closed regardless.
    pub fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.state.write();
        let result = state.log.sync().and_then(|()| state.map.sync());
        // Dropping the StorageDir releases the LOCK file even when the
        // final sync failed; the enumerator is closed either way.
        drop(self.dir.lock().take());
        result?;
        tracing::debug!("enumerator closed");
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Closed);
        }
        Ok(())
    }
}

impl<K, C> Drop for DurableEnumerator<K, C> {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let state = self.state.get_mut();
        let result = state.log.sync().and_then(|()| state.map.sync());
        if let Err(e) = result {
            tracing::error!(error = %e, "failed to sync enumerator on drop");
        }
    }
}

impl<K, C> std::fmt::Debug for DurableEnumerator<K, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableEnumerator")
            .field("len", &self.state.read_recursive().map.len())
            .field("corrupted", &self.corrupted.load(Ordering::SeqCst))
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Checks a loaded durable map against the log's current end: the map's
/// last recorded offset must parse as a record that ends exactly at the
/// log's length (or both must be empty).
fn map_matches_log(map: &DurableMap, log: &ValueLog) -> bool {
    let len = map.len();
    if len == 0 {
        return log.is_empty();
    }
    let Some(offset) = map.offset_of(KeyId::from_index(len - 1)) else {
        return false;
    };
    match log.record_at(offset) {
        Ok((_, end)) => end == log.len(),
        Err(_) => false,
    }
}

/// Scans the whole log, validating every record decodes, and returns
/// `(hash, offset)` pairs in id order for map reconstruction.
fn scan_log_entries<K, C: KeyCodec<K>>(
    log: &ValueLog,
    codec: &C,
) -> CoreResult<Vec<(i32, u64)>> {
    let mut entries = Vec::new();
    for record in log.iter() {
        let (offset, payload) = record?;
        let key = codec.decode(&payload).map_err(|e| {
            CoreError::corrupted(format!("record at offset {offset} does not decode: {e}"))
        })?;
        entries.push((codec.key_hash(&key)?, offset));
    }
    Ok(entries)
}
