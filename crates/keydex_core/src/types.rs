//! Core type definitions for keydex.

use std::fmt;

/// Stable integer id of an enumerated key.
///
/// Ids are positive, assigned in insertion order starting at 1, and never
/// reused while the enumerator is open. Once assigned, the id's mapping to
/// its key is immutable. The value 0 ([`KeyId::NULL`]) is the reserved
/// "not enumerated" sentinel and never refers to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub u32);

impl KeyId {
    /// The reserved null sentinel (never a valid key id).
    pub const NULL: KeyId = KeyId(0);

    /// Creates a key id from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this is the null sentinel.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The id of the n-th enumerated key (0-based insertion index).
    #[must_use]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// 0-based insertion index of this id.
    ///
    /// Must not be called on [`KeyId::NULL`].
    #[must_use]
    pub(crate) fn index(self) -> usize {
        debug_assert!(!self.is_null());
        self.0 as usize - 1
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.0)
    }
}
