//! Error types for keydex core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in keydex core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] keydex_storage::StorageError),

    /// Key codec error.
    #[error("codec error: {0}")]
    Codec(#[from] keydex_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A storage file is present but cannot be opened.
    ///
    /// Fatal for the open attempt; on-disk state is left untouched.
    #[error("cannot open storage: {message}")]
    Open {
        /// Description of the open failure.
        message: String,
    },

    /// The value log is unrecoverably corrupted, or an enumerator
    /// invariant was violated.
    ///
    /// Only the map is reconstructible; data past a corruption point in
    /// the log is unrecoverable by design.
    #[error("storage corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch on a log record.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed from the payload.
        actual: u32,
    },

    /// Another process holds the storage lock.
    #[error("storage locked: another process has exclusive access")]
    Locked,

    /// The id does not refer to an enumerated key.
    #[error("invalid key id: {id}")]
    InvalidId {
        /// The offending id value.
        id: u32,
    },

    /// The enumerator is closed.
    #[error("enumerator is closed")]
    Closed,
}

impl CoreError {
    /// Creates an open-failure error.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}
