//! UTF-8 string codec.

use crate::error::{CodecError, CodecResult};
use crate::KeyCodec;

/// Encodes `String` keys as their raw UTF-8 bytes.
///
/// No length prefix or terminator is added; the value log frames every
/// payload with its own length field, so the codec output may be any byte
/// sequence, including empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl KeyCodec<String> for Utf8Codec {
    fn encode(&self, key: &String) -> CodecResult<Vec<u8>> {
        Ok(key.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip_ascii() {
        let codec = Utf8Codec;
        let key = "src/main.rs".to_string();
        assert_eq!(codec.decode(&codec.encode(&key).unwrap()).unwrap(), key);
    }

    #[test]
    fn roundtrip_empty() {
        let codec = Utf8Codec;
        let key = String::new();
        let bytes = codec.encode(&key).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(codec.decode(&bytes).unwrap(), key);
    }

    #[test]
    fn roundtrip_multibyte() {
        let codec = Utf8Codec;
        let key = "путь/к/файлу — λ".to_string();
        assert_eq!(codec.decode(&codec.encode(&key).unwrap()).unwrap(), key);
    }

    #[test]
    fn rejects_invalid_utf8() {
        let codec = Utf8Codec;
        let result = codec.decode(&[0xFF, 0xFE, 0x80]);
        assert_eq!(result, Err(CodecError::InvalidUtf8));
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_strings(key in ".*") {
            let codec = Utf8Codec;
            let key = key.to_string();
            let bytes = codec.encode(&key).unwrap();
            prop_assert_eq!(codec.decode(&bytes).unwrap(), key);
        }

        #[test]
        fn equal_keys_hash_equal(key in ".*") {
            let codec = Utf8Codec;
            let key = key.to_string();
            prop_assert_eq!(
                codec.key_hash(&key).unwrap(),
                codec.key_hash(&key.clone()).unwrap()
            );
        }
    }
}
