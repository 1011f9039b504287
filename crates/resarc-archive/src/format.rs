//! Index file wire layout
//!
//! An index (`.arci`) starts with a fixed 48-byte header followed by a
//! table of fixed 40-byte entry records sorted by hash. All integers are
//! big-endian.
//!
//! ```text
//! header:  magic "ARCI" | version u32 | codec u8 | hash_len u8 | reserved u16
//!          entry_count u32 | entries_offset u32 | user_data u64 | reserved u32
//!          table_md5 [u8; 16]
//! record:  hash [u8; 20] | data_offset u64 | compressed_size u32
//!          decompressed_size u32 | flags u32
//! ```

use std::fmt;
use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use bitflags::bitflags;

use crate::error::{ArchiveError, ArchiveResult};
use crate::hash::{HASH_LENGTH, HashKey};

/// Index magic bytes
pub const INDEX_MAGIC: [u8; 4] = *b"ARCI";

/// Only supported index version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the index header in bytes
pub const INDEX_HEADER_SIZE: usize = 48;

/// Size of one entry record in bytes
pub const ENTRY_RECORD_SIZE: usize = HASH_LENGTH + 8 + 4 + 4 + 4;

/// Default extension of index files
pub const INDEX_EXTENSION: &str = "arci";

/// Default extension of the companion data file
pub const DATA_EXTENSION: &str = "arcd";

/// Compression codec declared once per archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Codec {
    /// Payloads are never compressed
    None = 0,
    /// LZ4 block format without a size prefix
    Lz4 = 1,
    /// zlib stream
    Zlib = 2,
}

impl Codec {
    /// Parse from byte value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Lz4),
            2 => Some(Self::Zlib),
            _ => None,
        }
    }

    /// Byte value stored in the header
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zlib => "zlib",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Per-entry flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u32 {
        /// Payload is encrypted and must be decrypted before decompression
        const ENCRYPTED = 0x1;
        /// Payload is compressed with the archive codec
        const COMPRESSED = 0x2;
        /// Entry arrived through a content update
        const LIVEUPDATE = 0x4;
    }
}

impl EntryFlags {
    /// Check whether the payload is compressed
    pub const fn is_compressed(self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    /// Check whether the payload is encrypted
    pub const fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

impl fmt::Display for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let mut names = Vec::new();
        if self.contains(Self::COMPRESSED) {
            names.push("compressed");
        }
        if self.contains(Self::ENCRYPTED) {
            names.push("encrypted");
        }
        if self.contains(Self::LIVEUPDATE) {
            names.push("liveupdate");
        }
        f.write_str(&names.join(","))
    }
}

/// Index file header
///
/// binrw only takes a literal magic; `test_magic_matches_constant` ties it
/// to [`INDEX_MAGIC`].
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big, magic = b"ARCI")]
pub struct IndexHeader {
    /// Format version (always 1)
    pub version: u32,
    /// Raw codec byte, see [`Codec`]
    pub codec: u8,
    /// Hash length in bytes (always `HASH_LENGTH`)
    pub hash_length: u8,
    /// Reserved
    pub reserved0: u16,
    /// Number of entry records
    pub entry_count: u32,
    /// Byte offset of the first entry record
    pub entries_offset: u32,
    /// Opaque value set by the producer
    pub user_data: u64,
    /// Reserved
    pub reserved1: u32,
    /// MD5 of the entry table bytes
    pub table_md5: [u8; 16],
}

impl IndexHeader {
    /// Create a header for `entry_count` records placed right after it
    pub fn new(codec: Codec, entry_count: u32, table_md5: [u8; 16]) -> Self {
        Self {
            version: FORMAT_VERSION,
            codec: codec.as_byte(),
            hash_length: HASH_LENGTH as u8,
            reserved0: 0,
            entry_count,
            entries_offset: INDEX_HEADER_SIZE as u32,
            user_data: 0,
            reserved1: 0,
            table_md5,
        }
    }

    /// Parse and validate the header at the start of `index`
    pub fn parse(index: &[u8]) -> ArchiveResult<Self> {
        if index.len() < INDEX_HEADER_SIZE {
            return Err(ArchiveError::invalid_format(format!(
                "index is {} bytes, header needs {INDEX_HEADER_SIZE}",
                index.len()
            )));
        }

        let header = Self::read(&mut Cursor::new(&index[..INDEX_HEADER_SIZE]))
            .map_err(|e| ArchiveError::invalid_format(format!("bad index header: {e}")))?;
        header.validate()?;
        Ok(header)
    }

    /// Check version, codec, hash length and table placement
    pub fn validate(&self) -> ArchiveResult<()> {
        if self.version != FORMAT_VERSION {
            return Err(ArchiveError::invalid_format(format!(
                "unsupported index version {}",
                self.version
            )));
        }

        if Codec::from_byte(self.codec).is_none() {
            return Err(ArchiveError::invalid_format(format!(
                "unknown codec 0x{:02X}",
                self.codec
            )));
        }

        if self.hash_length as usize != HASH_LENGTH {
            return Err(ArchiveError::invalid_format(format!(
                "hash length {} does not match {HASH_LENGTH}",
                self.hash_length
            )));
        }

        if (self.entries_offset as usize) < INDEX_HEADER_SIZE {
            return Err(ArchiveError::invalid_format(format!(
                "entries offset {} overlaps the header",
                self.entries_offset
            )));
        }

        Ok(())
    }

    /// Declared codec
    ///
    /// Only meaningful after [`validate`](Self::validate) succeeded.
    pub fn codec(&self) -> Codec {
        Codec::from_byte(self.codec).unwrap_or(Codec::None)
    }

    /// Byte range of the entry table, or `None` if it overflows `usize`
    pub fn table_range(&self) -> Option<std::ops::Range<usize>> {
        let start = self.entries_offset as usize;
        let len = (self.entry_count as usize).checked_mul(ENTRY_RECORD_SIZE)?;
        let end = start.checked_add(len)?;
        Some(start..end)
    }
}

/// One entry record as stored in the index
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct EntryRecord {
    /// Content hash
    pub hash: HashKey,
    /// Offset of the payload in the data source
    pub data_offset: u64,
    /// Stored payload size
    pub compressed_size: u32,
    /// Size after decompression
    pub decompressed_size: u32,
    /// Raw flag bits, see [`EntryFlags`]
    pub flags: u32,
}

/// MD5 of the entry table bytes, as stored in the header
pub fn table_checksum(table: &[u8]) -> [u8; 16] {
    md5::compute(table).0
}
