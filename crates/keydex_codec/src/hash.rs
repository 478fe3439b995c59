//! Deterministic key hashing.

/// FNV-1a offset basis (32-bit).
const FNV_OFFSET: u32 = 0x811C_9DC5;

/// FNV-1a prime (32-bit).
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes the deterministic 32-bit FNV-1a hash of encoded key bytes.
///
/// This is the hash the int-to-multi-int map buckets by. It is computed
/// over the canonical codec output so two processes (or two runs of the
/// same process) always agree on the bucket for a given key.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> i32 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i32
}
