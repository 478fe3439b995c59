//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Byte sequence is not valid UTF-8.
    #[error("invalid UTF-8 in encoded key")]
    InvalidUtf8,

    /// Byte sequence has the wrong length for a fixed-width key.
    #[error("wrong encoded length: expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Expected encoded length.
        expected: usize,
        /// Actual encoded length.
        actual: usize,
    },

    /// Key cannot be represented by this codec.
    #[error("unencodable key: {message}")]
    Unencodable {
        /// Description of why the key is unencodable.
        message: String,
    },
}

impl CodecError {
    /// Creates an unencodable-key error.
    pub fn unencodable(message: impl Into<String>) -> Self {
        Self::Unencodable {
            message: message.into(),
        }
    }
}
