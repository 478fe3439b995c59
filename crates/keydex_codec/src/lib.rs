//! # keydex codec
//!
//! Deterministic key encoding for keydex.
//!
//! A [`KeyCodec`] turns a typed key into its canonical byte form and back.
//! Determinism is the load-bearing property: identical keys must produce
//! identical bytes on every platform and in every process, because both
//! the on-disk value log and the key hash are derived from the encoded
//! form. The codec carries no framing; record lengths and checksums are
//! the value log's job.
//!
//! ## Provided codecs
//!
//! - [`Utf8Codec`]: strings as raw UTF-8 bytes
//! - [`U32Codec`]: fixed 4-byte little-endian integers
//!
//! ## Usage
//!
//! ```
//! use keydex_codec::{KeyCodec, Utf8Codec};
//!
//! let codec = Utf8Codec;
//! let bytes = codec.encode(&"hello".to_string()).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod hash;
mod int;
mod string;

pub use error::{CodecError, CodecResult};
pub use hash::hash_bytes;
pub use int::U32Codec;
pub use string::Utf8Codec;

/// Encodes typed keys to canonical bytes and back.
///
/// # Contract
///
/// - `encode` is deterministic and side-effect-free
/// - `decode(encode(k)) == k` for every supported key
/// - `decode` rejects malformed input with a [`CodecError`] rather than
///   producing a garbage key (the enumerator treats decode failures as
///   corruption evidence)
pub trait KeyCodec<K>: Send + Sync {
    /// Encodes a key to its canonical byte form.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be represented by this codec.
    fn encode(&self, key: &K) -> CodecResult<Vec<u8>>;

    /// Decodes a key from its canonical byte form.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding.
    fn decode(&self, bytes: &[u8]) -> CodecResult<K>;

    /// Deterministic integer hash of the key.
    ///
    /// Computed over the canonical encoded bytes, never the language hash,
    /// so hash buckets are reproducible across processes and versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be encoded.
    fn key_hash(&self, key: &K) -> CodecResult<i32> {
        Ok(hash_bytes(&self.encode(key)?))
    }
}
