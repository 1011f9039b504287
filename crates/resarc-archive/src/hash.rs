//! Content hash keys that address archive entries

use std::cmp::Ordering;
use std::fmt;

use binrw::{BinRead, BinWrite};
use sha1::{Digest, Sha1};

use crate::error::{ArchiveError, ArchiveResult};

/// Length in bytes of every hash key (SHA-1 digest size)
pub const HASH_LENGTH: usize = 20;

/// Fixed-length content hash identifying an archive entry
///
/// Ordering is lexicographic over the bytes and defines the sort order of
/// the entry table.
#[derive(BinRead, BinWrite, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey([u8; HASH_LENGTH]);

impl HashKey {
    /// Create hash key from raw bytes
    pub const fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create hash key from a slice, which must be exactly `HASH_LENGTH` bytes
    pub fn from_slice(bytes: &[u8]) -> ArchiveResult<Self> {
        let array: [u8; HASH_LENGTH] = bytes.try_into().map_err(|_| {
            ArchiveError::InvalidHash(format!(
                "expected {HASH_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Create hash key from content by computing its SHA-1 digest
    pub fn from_data(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    /// Parse hash key from a hex string
    pub fn from_hex(hex: &str) -> ArchiveResult<Self> {
        let mut bytes = [0u8; HASH_LENGTH];
        hex::decode_to_slice(hex.trim(), &mut bytes)
            .map_err(|e| ArchiveError::InvalidHash(format!("{e}: {hex}")))?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compare two keys in table order
    pub fn compare(a: &Self, b: &Self) -> Ordering {
        a.0.cmp(&b.0)
    }
}

impl PartialOrd for HashKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HashKey {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::compare(self, other)
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashKey({})", self.to_hex())
    }
}

impl From<[u8; HASH_LENGTH]> for HashKey {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for HashKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
