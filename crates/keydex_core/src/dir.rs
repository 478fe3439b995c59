//! Storage directory management.
//!
//! File system layout for one enumerator:
//!
//! ```text
//! <path>/
//! ├─ LOCK        # Advisory lock for single-writer-process exclusivity
//! ├─ keys.log    # Append-only value log (source of truth)
//! ├─ keys.map    # Persisted int-to-multi-int map + id-to-offset index
//! └─ CORRUPTED   # Marker; presence forces a rebuild on next open
//! ```
//!
//! The LOCK file ensures only one process opens a storage path at a time.
//! `keys.map` is replaced atomically (write temp, fsync, rename, fsync
//! directory) so a crash mid-rebuild never leaves a half-written map.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File names within the storage directory.
const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "keys.log";
const MAP_FILE: &str = "keys.map";
const MAP_TEMP: &str = "keys.map.tmp";
const CORRUPTED_MARKER: &str = "CORRUPTED";

/// Manages the storage directory layout and the process-exclusivity lock.
///
/// Only one `StorageDir` instance can exist per directory at a time; the
/// advisory lock is held until drop.
#[derive(Debug)]
pub struct StorageDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle, held for exclusive access.
    _lock_file: File,
}

impl StorageDir {
    /// Opens or creates a storage directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Locked`] if another process holds the lock,
    /// [`CoreError::Open`] if the path exists but is not a directory, or
    /// an I/O error.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::open(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the storage directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the value log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns the path to the map file.
    #[must_use]
    pub fn map_path(&self) -> PathBuf {
        self.path.join(MAP_FILE)
    }

    /// Whether the corruption marker is present.
    #[must_use]
    pub fn has_corruption_marker(&self) -> bool {
        self.path.join(CORRUPTED_MARKER).exists()
    }

    /// Creates the corruption marker and makes it durable.
    pub fn write_corruption_marker(&self) -> CoreResult<()> {
        let marker_path = self.path.join(CORRUPTED_MARKER);
        let file = File::create(marker_path)?;
        file.sync_all()?;
        self.sync_directory()?;
        Ok(())
    }

    /// Removes the corruption marker if present.
    pub fn clear_corruption_marker(&self) -> CoreResult<()> {
        let marker_path = self.path.join(CORRUPTED_MARKER);
        if marker_path.exists() {
            fs::remove_file(marker_path)?;
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Removes the value log file (foreign/version-mismatched file case).
    pub fn remove_log(&self) -> CoreResult<()> {
        let log_path = self.log_path();
        if log_path.exists() {
            fs::remove_file(log_path)?;
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Removes the map file (foreign/version-mismatched file case).
    pub fn remove_map(&self) -> CoreResult<()> {
        let map_path = self.map_path();
        if map_path.exists() {
            fs::remove_file(map_path)?;
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Replaces the map file atomically with the given content.
    ///
    /// Write-then-rename pattern for crash safety:
    /// 1. Write to a temporary file
    /// 2. Sync the temporary file to disk
    /// 3. Rename it over `keys.map`
    /// 4. Fsync the directory so the rename is durable
    pub fn replace_map(&self, content: &[u8]) -> CoreResult<()> {
        let map_path = self.map_path();
        let temp_path = self.path.join(MAP_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &map_path)?;
        self.sync_directory()?;

        Ok(())
    }

    /// Syncs the directory so file creations/renames/removals are durable.
    ///
    /// On Windows the NTFS journal provides equivalent metadata durability
    /// and directory fsync is not supported, so this is a no-op there.
    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
