//! Fixed-width integer codec.

use crate::error::{CodecError, CodecResult};
use crate::KeyCodec;

/// Encodes `u32` keys as fixed 4-byte little-endian values.
#[derive(Debug, Clone, Copy, Default)]
pub struct U32Codec;

impl KeyCodec<u32> for U32Codec {
    fn encode(&self, key: &u32) -> CodecResult<Vec<u8>> {
        Ok(key.to_le_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<u32> {
        let array: [u8; 4] = bytes.try_into().map_err(|_| CodecError::WrongLength {
            expected: 4,
            actual: bytes.len(),
        })?;
        Ok(u32::from_le_bytes(array))
    }
}
