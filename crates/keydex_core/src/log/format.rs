//! Value log file format.
//!
//! ```text
//! header:  magic "KLOG" (4) | version u16 LE (2) | reserved zeros (10)
//! record:  payload length u32 LE (4) | payload | crc32(payload) u32 LE (4)
//! ```
//!
//! Records start immediately after the header, so offset 0 never refers
//! to a record and can serve as a reserved sentinel. The file's length is
//! the committed length; there is no separate record count field.

/// Magic bytes identifying a keydex value log.
pub const LOG_MAGIC: [u8; 4] = *b"KLOG";

/// Current value log format version.
pub const LOG_VERSION: u16 = 1;

/// Fixed file header size.
pub const HEADER_SIZE: u64 = 16;

/// Per-record framing overhead: length field plus CRC trailer.
pub const RECORD_OVERHEAD: u64 = 8;

/// Maximum payload size a record may carry.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Builds the fixed file header.
#[must_use]
pub fn encode_header() -> [u8; HEADER_SIZE as usize] {
    let mut header = [0u8; HEADER_SIZE as usize];
    header[0..4].copy_from_slice(&LOG_MAGIC);
    header[4..6].copy_from_slice(&LOG_VERSION.to_le_bytes());
    header
}

/// Outcome of validating a file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    /// Header matches this format and version.
    Valid,
    /// Magic or version differs; the file belongs to another format or an
    /// incompatible version and is treated as absent, not corrupted.
    Mismatch,
}

/// Validates a 16-byte header against this format.
#[must_use]
pub fn check_header(bytes: &[u8]) -> HeaderCheck {
    if bytes.len() < HEADER_SIZE as usize
        || bytes[0..4] != LOG_MAGIC
        || u16::from_le_bytes([bytes[4], bytes[5]]) != LOG_VERSION
    {
        return HeaderCheck::Mismatch;
    }
    HeaderCheck::Valid
}

/// Computes the CRC32 checksum of the given bytes (IEEE polynomial).
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
