//! Enumerator configuration.

/// Which int-to-multi-int map implementation backs the enumerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    /// Persisted to `keys.map`; loaded at open, rebuilt only when stale.
    Durable,
    /// Pure in-memory; rebuilt from the value log on every open.
    InMemory,
}

/// Configuration for opening an enumerator.
#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    /// Map implementation to use.
    pub map_kind: MapKind,

    /// Whether a stale/missing/corrupt-flagged map is rebuilt from the
    /// value log at open. When false, inconsistency fails the open.
    pub rebuild_if_inconsistent: bool,

    /// Size of the value log's staged append buffer in bytes.
    ///
    /// Records larger than this bypass the buffer and are written to the
    /// backend directly; no record is ever truncated.
    pub append_buffer_size: usize,

    /// Whether `force()` additionally syncs file metadata to disk
    /// (safer but slower).
    pub sync_on_force: bool,

    /// Capacity of the bounded id-to-key value cache (0 disables it).
    pub value_cache_capacity: usize,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            map_kind: MapKind::Durable,
            rebuild_if_inconsistent: true,
            append_buffer_size: 64 * 1024, // 64 KB
            sync_on_force: true,
            value_cache_capacity: 1024,
        }
    }
}

impl EnumeratorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the map implementation.
    #[must_use]
    pub const fn map_kind(mut self, kind: MapKind) -> Self {
        self.map_kind = kind;
        self
    }

    /// Sets whether a stale map is rebuilt at open.
    #[must_use]
    pub const fn rebuild_if_inconsistent(mut self, value: bool) -> Self {
        self.rebuild_if_inconsistent = value;
        self
    }

    /// Sets the append buffer size.
    #[must_use]
    pub const fn append_buffer_size(mut self, size: usize) -> Self {
        self.append_buffer_size = size;
        self
    }

    /// Sets whether `force()` syncs file metadata.
    #[must_use]
    pub const fn sync_on_force(mut self, value: bool) -> Self {
        self.sync_on_force = value;
        self
    }

    /// Sets the value cache capacity (0 disables caching).
    #[must_use]
    pub const fn value_cache_capacity(mut self, capacity: usize) -> Self {
        self.value_cache_capacity = capacity;
        self
    }
}
